//! Common test utilities for kindstore-query
//!
//! Shared fixtures and builders for the integration tests.

mod builders;
mod fixtures;

pub use builders::*;
pub use fixtures::*;
