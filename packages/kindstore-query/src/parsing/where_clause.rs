//! `where` clause → Filter Expression
//!
//! Accepted shapes:
//! - `{field: value}` → `eq`
//! - `{field: {op: operand, ...}}` (every key an operator name) → one comparison per operator
//! - `{and: [...]}` / `{or: [...]}` → combinators
//! - several keys at one level → conjunction
//!
//! An object value that is not an operator map stays an equality on an
//! object; flattening to dotted paths happens downstream.

use serde_json::{Map, Value};

use crate::domain::filter::{FilterExpr, Operator, Predicate};
use crate::error::{QueryError, Result};

const AND_KEY: &str = "and";
const OR_KEY: &str = "or";

pub fn parse_where(value: &Value) -> Result<FilterExpr> {
    match value {
        Value::Null => Ok(FilterExpr::Empty),
        Value::Object(map) => parse_object(map),
        other => Err(QueryError::invalid_filter(format!(
            "where must be an object, got {}",
            other
        ))),
    }
}

fn parse_object(map: &Map<String, Value>) -> Result<FilterExpr> {
    let mut clauses = Vec::with_capacity(map.len());

    for (key, value) in map {
        match key.as_str() {
            AND_KEY => clauses.push(FilterExpr::And(parse_branches(key, value)?)),
            OR_KEY => clauses.push(FilterExpr::Or(parse_branches(key, value)?)),
            field => clauses.push(parse_field(field, value)?),
        }
    }

    Ok(match clauses.len() {
        0 => FilterExpr::Empty,
        1 => clauses.remove(0),
        _ => FilterExpr::And(clauses),
    })
}

fn parse_branches(key: &str, value: &Value) -> Result<Vec<FilterExpr>> {
    let Value::Array(branches) = value else {
        return Err(QueryError::invalid_filter(format!(
            "'{}' expects an array of conditions",
            key
        )));
    };
    branches.iter().map(parse_where).collect()
}

/// True when every key of a non-empty object is an operator name
pub fn is_operator_map(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| Operator::from_name(k).is_some())
}

fn parse_field(field: &str, value: &Value) -> Result<FilterExpr> {
    if field.is_empty() {
        return Err(QueryError::invalid_filter("where contains an empty field name"));
    }

    match value {
        Value::Object(ops) if is_operator_map(ops) => {
            let mut comparisons = Vec::with_capacity(ops.len());
            for (name, operand) in ops {
                // is_operator_map guarantees the lookup succeeds
                let Some(operator) = Operator::from_name(name) else {
                    continue;
                };
                let predicate = Predicate::from_operator(operator, operand.clone()).map_err(
                    |e| QueryError::invalid_filter(format!("where[{}][{}]: {}", field, name, e.message)),
                )?;
                comparisons.push(FilterExpr::compare(field, predicate));
            }
            Ok(if comparisons.len() == 1 {
                comparisons.remove(0)
            } else {
                FilterExpr::And(comparisons)
            })
        }
        other => Ok(FilterExpr::eq(field, other.clone())),
    }
}
