//! Native Query Translator: Filter Expression → store query document
//!
//! ```text
//! And([eq(_kind, "book"), like(_name, "Dune%")])
//!   → {"$and": [{"_kind": {"$eq": "book"}}, {"_name": {"$regex": "^Dune.*$", "$options": "s"}}]}
//! ```
//!
//! Comparisons always use the explicit operator form so that several
//! conditions on one flattened key merge into a single compound object.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::domain::filter::{Comparison, FilterExpr, Operator, Predicate};
use crate::domain::value::{coerce_date_value, DateFields};

pub const AND: &str = "$and";
pub const OR: &str = "$or";
pub const NOR: &str = "$nor";
pub const REGEX: &str = "$regex";
pub const OPTIONS: &str = "$options";

/// Operator name → native operator
static OPERATOR_TABLE: Lazy<HashMap<Operator, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (Operator::Eq, "$eq"),
        (Operator::Neq, "$ne"),
        (Operator::Gt, "$gt"),
        (Operator::Gte, "$gte"),
        (Operator::Lt, "$lt"),
        (Operator::Lte, "$lte"),
        (Operator::Inq, "$in"),
        (Operator::Nin, "$nin"),
        (Operator::Exists, "$exists"),
        (Operator::Like, REGEX),
        (Operator::Ilike, REGEX),
    ])
});

pub fn native_operator(operator: Operator) -> Option<&'static str> {
    OPERATOR_TABLE.get(&operator).copied()
}

/// `%` → any run of characters, everything else literal, anchored.
/// Run with the `s` option so `.` also spans newlines.
pub fn like_to_regex(pattern: &str) -> String {
    let body: Vec<String> = pattern.split('%').map(regex::escape).collect();
    format!("^{}$", body.join(".*"))
}

/// `$options` for like (`s`) and ilike (`is`)
pub fn like_options(ignore_case: bool) -> &'static str {
    if ignore_case {
        "is"
    } else {
        "s"
    }
}

const REGEX_CACHE_CAPACITY: usize = 512;

/// Compiled `$regex` patterns keyed by `(pattern, options)`
static REGEX_CACHE: Lazy<RwLock<HashMap<(String, String), Regex>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The regex a `$regex` / `$options` pair denotes. Options: `i` case
/// insensitive (Unicode simple case folding), `s` dot matches newline,
/// `m` multi-line anchors.
///
/// Both the in-memory matcher and the native evaluator go through here, so
/// like/ilike agree on every input.
pub fn native_regex(pattern: &str, options: &str) -> Result<Regex, regex::Error> {
    let key = (pattern.to_string(), options.to_string());
    if let Some(regex) = REGEX_CACHE.read().get(&key) {
        return Ok(regex.clone());
    }

    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .dot_matches_new_line(options.contains('s'))
        .multi_line(options.contains('m'))
        .build()?;

    let mut cache = REGEX_CACHE.write();
    if cache.len() >= REGEX_CACHE_CAPACITY {
        cache.clear();
    }
    cache.insert(key, regex.clone());
    Ok(regex)
}

#[derive(Debug, Clone, Default)]
pub struct NativeTranslator {
    date_fields: DateFields,
}

impl NativeTranslator {
    pub fn new(date_fields: DateFields) -> Self {
        Self { date_fields }
    }

    pub fn date_fields(&self) -> &DateFields {
        &self.date_fields
    }

    /// Translate to a query document; `Empty` becomes `{}`
    pub fn translate(&self, expr: &FilterExpr) -> Value {
        match expr {
            FilterExpr::Empty => json!({}),
            FilterExpr::And(children) if children.is_empty() => json!({}),
            FilterExpr::And(children) => json!({ AND: self.translate_all(children) }),
            // Nothing matches an empty disjunction
            FilterExpr::Or(children) if children.is_empty() => json!({ NOR: [{}] }),
            FilterExpr::Or(children) => json!({ OR: self.translate_all(children) }),
            FilterExpr::Compare(comparison) => self.translate_comparison(comparison),
        }
    }

    fn translate_all(&self, children: &[FilterExpr]) -> Vec<Value> {
        children.iter().map(|c| self.translate(c)).collect()
    }

    fn translate_comparison(&self, comparison: &Comparison) -> Value {
        let mut merged: Map<String, Value> = Map::new();
        let mut overflow: Vec<Value> = Vec::new();

        for leaf in comparison.expand() {
            for (op, operand) in self.conditions(&leaf) {
                let slot = merged
                    .entry(leaf.field.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                let Value::Object(conditions) = slot else {
                    continue;
                };
                if conditions.contains_key(op) {
                    // Same operator twice on one key: keep both via $and
                    overflow.push(json!({ leaf.field.clone(): { op: operand } }));
                } else {
                    conditions.insert(op.to_string(), operand);
                }
            }
        }

        let base = Value::Object(merged);
        if overflow.is_empty() {
            base
        } else {
            let mut all = vec![base];
            all.extend(overflow);
            json!({ AND: all })
        }
    }

    /// Native (operator, operand) pairs for one leaf comparison
    fn conditions(&self, leaf: &Comparison) -> Vec<(&'static str, Value)> {
        let coerce = |v: &Value| {
            if self.date_fields.is_date_field(&leaf.field) {
                coerce_date_value(v)
            } else {
                v.clone()
            }
        };
        let op = |operator: Operator| native_operator(operator).unwrap_or("$eq");

        match &leaf.predicate {
            Predicate::Eq(v)
            | Predicate::Neq(v)
            | Predicate::Gt(v)
            | Predicate::Gte(v)
            | Predicate::Lt(v)
            | Predicate::Lte(v) => vec![(op(leaf.operator()), coerce(v))],
            Predicate::Inq(list) | Predicate::Nin(list) => vec![(
                op(leaf.operator()),
                Value::Array(list.iter().map(coerce).collect()),
            )],
            Predicate::Between(low, high) => {
                let mut out = Vec::with_capacity(2);
                if let Some(low) = low {
                    out.push((op(Operator::Gte), coerce(low)));
                }
                if let Some(high) = high {
                    out.push((op(Operator::Lte), coerce(high)));
                }
                out
            }
            Predicate::Exists(present) => vec![(op(Operator::Exists), Value::Bool(*present))],
            Predicate::Like(pattern) => vec![
                (REGEX, Value::String(like_to_regex(pattern))),
                (OPTIONS, Value::String(like_options(false).into())),
            ],
            Predicate::Ilike(pattern) => vec![
                (REGEX, Value::String(like_to_regex(pattern))),
                (OPTIONS, Value::String(like_options(true).into())),
            ],
        }
    }
}
