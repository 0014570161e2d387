//! Feature modules
//!
//! Dependency order, leaf first:
//! - sets    - Set model and Set Compiler
//! - scope   - placeholder paths and the Scope Interpolator
//! - matcher - In-Memory Matcher
//! - native  - Native Query Translator, stages, Pipeline Builder
//! - limits  - Limit Engine (record limits + uniqueness)

pub mod limits;
pub mod matcher;
pub mod native;
pub mod scope;
pub mod sets;
