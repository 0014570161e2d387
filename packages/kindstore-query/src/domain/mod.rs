//! Domain layer
//!
//! Pure types shared by every feature: the Filter Expression AST, value
//! semantics, duration windows, the inbound `Filter` and the record model.
//! Nothing here performs I/O.

pub mod duration;
pub mod filter;
pub mod query;
pub mod record;
pub mod value;

pub use duration::{DurationSpec, DurationUnit, TimeWindow};
pub use filter::{Comparison, FilterExpr, Operator, Predicate};
pub use query::{FieldSelection, Filter, QueryDefaults, SortDirection, SortKey};
pub use record::{fields, RecordFamily, RecordView, Visibility};
pub use value::{DateFields, DATE_KEY};
