//! kindstore-query: query compilation and scope-limit engine for polymorphic
//! entity/list records
//!
//! > Declare access policy, quotas and queries once; compile them for the
//! > store and evaluate them in process with the same meaning.
//!
//! ## Components
//!
//! - **Set Compiler** (`features::sets`): named predicates → Filter Expression
//! - **Native Query Translator** (`features::native`): Filter Expression → query document
//! - **Pipeline Builder** (`features::native`): relation and collection pipelines
//! - **In-Memory Matcher** (`features::matcher`): Filter Expression → `bool` per record
//! - **Scope Interpolator** (`features::scope`): `where[...]`/`set[...]` templates with `${path}` placeholders
//! - **Limit Engine** (`features::limits`): record limits and uniqueness rules
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kindstore_query::{sets, CollectionQuery, EngineConfig, Filter, Set};
//!
//! let config = EngineConfig::from_yaml_file("kindstore.yaml")?;
//! let input = "set[publics]=true&set[actives]=true&filter[where][_kind]=book&filter[limit]=20";
//!
//! let set_expr = sets::compile(&Set::from_query_string(input)?, chrono::Utc::now());
//! let filter = Filter::from_query_string(input)?;
//! let stages = CollectionQuery::new(filter, set_expr).build(&config.translator());
//! let rows = store.aggregate("GenericEntity", &stages).await?;
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod features;
pub mod infrastructure;
pub mod parsing;

pub use error::{ErrorKind, QueryError, Result};

pub use config::{ConfigError, EngineConfig, FamilyConfig, KindConfig, RuleKind, RuleList, ScopeRule};
pub use domain::{
    DateFields, DurationSpec, FieldSelection, Filter, FilterExpr, Operator, Predicate,
    QueryDefaults, RecordFamily, SortDirection, SortKey,
};
pub use features::limits::{LimitEngine, RecordCounter, StoreCounter, WriteContext};
pub use features::matcher::Matcher;
pub use features::native::{
    CollectionQuery, DocumentStore, JoinSpec, NativeTranslator, RelationQuery, Stage,
};
pub use features::scope::ScopeTemplate;
pub use features::sets::{self as sets, Principals, Set, SetPredicate};
pub use infrastructure::InMemoryDocumentStore;
