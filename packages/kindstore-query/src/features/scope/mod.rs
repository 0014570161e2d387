//! Scope templates: bracketed `where[...]` / `set[...]` syntax with `${path}`
//! placeholders, resolved per record

pub mod interpolator;
pub mod path;

pub use interpolator::{interpolate, ScopeTemplate};
pub use path::{PathSegment, PlaceholderPath};
