//! Record limits and uniqueness: scope rules counted against the store

pub mod counter;
pub mod engine;

pub use counter::{RecordCounter, StoreCounter};
pub use engine::{Clock, LimitEngine, WriteContext};
