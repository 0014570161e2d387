//! Native (document-store) side of the engine: query documents, typed
//! aggregation stages, relation and collection pipelines

pub mod pipeline;
pub mod stage;
pub mod store;
pub mod translator;

pub use pipeline::{effective_limit, prefix_fields, CollectionQuery, JoinSpec, RelationQuery};
pub use stage::{pipeline_document, Stage};
pub use store::DocumentStore;
pub use translator::{like_to_regex, native_operator, NativeTranslator};
