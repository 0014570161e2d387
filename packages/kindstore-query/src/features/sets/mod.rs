//! Sets: declarative named predicates (`publics`, `actives`, `createds-30d`,
//! `owners`, ...) compiled into Filter Expressions

pub mod compiler;
pub mod model;

pub use compiler::{compile, compile_with};
pub use model::{Principals, Set, SetPredicate};
