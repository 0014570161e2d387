//! Infrastructure layer - storage adapters
//!
//! Only the in-memory adapter lives here; database-backed stores implement
//! `features::native::DocumentStore` in their own crates.

pub mod memory_store;
pub mod native_eval;

pub use memory_store::InMemoryDocumentStore;
pub use native_eval::{matches_document, run_stages};
