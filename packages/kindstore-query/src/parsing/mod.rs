//! Inbound syntax: bracketed query strings and `where` clauses

pub mod query_string;
pub mod where_clause;

pub use query_string::{parse as parse_query_string, QueryPair};
pub use where_clause::parse_where;
