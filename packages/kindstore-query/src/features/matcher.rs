//! In-Memory Matcher: evaluate a Filter Expression directly against a record
//!
//! Total by construction: malformed operands and type mismatches evaluate to
//! `false` for the comparison, never to an error. A missing field compares as
//! `null`.

use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

use crate::domain::filter::{Comparison, FilterExpr, Predicate};
use crate::domain::value::{coerce_date_value, compare_values, resolve_path, values_equal, DateFields};
use crate::features::native::translator::{like_options, like_to_regex, native_regex};

static NULL: Value = Value::Null;

/// Matcher bound to a date-field configuration
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    date_fields: DateFields,
}

impl Matcher {
    pub fn new(date_fields: DateFields) -> Self {
        Self { date_fields }
    }

    pub fn matches(&self, expr: &FilterExpr, record: &Value) -> bool {
        let record = if self.date_fields.is_empty() {
            Cow::Borrowed(record)
        } else {
            Cow::Owned(self.date_fields.coerce_record(record))
        };
        self.eval(expr, &record)
    }

    /// Keep only the records that match
    pub fn filter<'a>(&self, expr: &FilterExpr, records: &'a [Value]) -> Vec<&'a Value> {
        records.iter().filter(|r| self.matches(expr, r)).collect()
    }

    fn eval(&self, expr: &FilterExpr, record: &Value) -> bool {
        match expr {
            FilterExpr::Empty => true,
            FilterExpr::And(children) => children.iter().all(|c| self.eval(c, record)),
            FilterExpr::Or(children) => children.iter().any(|c| self.eval(c, record)),
            FilterExpr::Compare(comparison) => comparison
                .expand()
                .iter()
                .all(|leaf| self.eval_leaf(leaf, record)),
        }
    }

    fn operand<'v>(&self, field: &str, value: &'v Value) -> Cow<'v, Value> {
        if self.date_fields.is_date_field(field) {
            Cow::Owned(coerce_date_value(value))
        } else {
            Cow::Borrowed(value)
        }
    }

    fn eval_leaf(&self, leaf: &Comparison, record: &Value) -> bool {
        let field = leaf.field.as_str();
        let candidates = resolve_path(record, field);
        let values = || candidates.iter().map(|c| c.unwrap_or(&NULL));

        let range = |operand: &Value, accept: fn(Ordering) -> bool| {
            let operand = self.operand(field, operand);
            values().any(|v| compare_values(v, &operand).is_some_and(accept))
        };
        let equals_any = |operands: &[Value]| {
            let operands: Vec<Cow<'_, Value>> =
                operands.iter().map(|o| self.operand(field, o)).collect();
            values().any(|v| operands.iter().any(|o| values_equal(v, o)))
        };

        match &leaf.predicate {
            Predicate::Eq(v) => equals_any(std::slice::from_ref(v)),
            Predicate::Neq(v) => !equals_any(std::slice::from_ref(v)),
            Predicate::Gt(v) => range(v, |o| o == Ordering::Greater),
            Predicate::Gte(v) => range(v, |o| o != Ordering::Less),
            Predicate::Lt(v) => range(v, |o| o == Ordering::Less),
            Predicate::Lte(v) => range(v, |o| o != Ordering::Greater),
            Predicate::Inq(list) => equals_any(list),
            Predicate::Nin(list) => !equals_any(list),
            Predicate::Between(low, high) => {
                low.as_ref()
                    .map_or(true, |l| range(l, |o| o != Ordering::Less))
                    && high
                        .as_ref()
                        .map_or(true, |h| range(h, |o| o != Ordering::Greater))
            }
            Predicate::Exists(present) => candidates.iter().any(Option::is_some) == *present,
            Predicate::Like(pattern) => values().any(|v| {
                v.as_str()
                    .is_some_and(|s| like_matches(pattern, s, false))
            }),
            Predicate::Ilike(pattern) => values().any(|v| {
                v.as_str()
                    .is_some_and(|s| like_matches(pattern, s, true))
            }),
        }
    }
}

/// Evaluate with the default date fields
pub fn matches(expr: &FilterExpr, record: &Value) -> bool {
    Matcher::default().matches(expr, record)
}

/// Whole-value like/ilike, through the same regex the translated query
/// carries
fn like_matches(pattern: &str, text: &str, ignore_case: bool) -> bool {
    native_regex(&like_to_regex(pattern), like_options(ignore_case))
        .is_ok_and(|regex| regex.is_match(text))
}
