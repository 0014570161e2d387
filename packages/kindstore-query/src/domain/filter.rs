// Filter Expression AST - the shared representation of every query backend
//
// - Combinators: And / Or (order preserved, semantics commutative)
// - Comparisons: field (dotted path) + typed predicate
// - Empty: explicit "no constraint" marker, distinct from Or([]) ("nothing")
//
// Producers: Set Compiler, where-clause parser, Scope Interpolator, Limit Engine
// Consumers: In-Memory Matcher, Native Query Translator

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::value::as_native_date;
use crate::error::{QueryError, Result};

/// Comparison operator names, as they appear in `where` clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Inq,
    Nin,
    Between,
    Exists,
    Like,
    Ilike,
}

impl Operator {
    pub const ALL: [Operator; 12] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Inq,
        Operator::Nin,
        Operator::Between,
        Operator::Exists,
        Operator::Like,
        Operator::Ilike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Inq => "inq",
            Operator::Nin => "nin",
            Operator::Between => "between",
            Operator::Exists => "exists",
            Operator::Like => "like",
            Operator::Ilike => "ilike",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operator together with its operand, shaped per operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "lowercase")]
pub enum Predicate {
    Eq(Value),
    Neq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Inq(Vec<Value>),
    Nin(Vec<Value>),
    /// Either bound may be absent (open-ended range)
    Between(Option<Value>, Option<Value>),
    Exists(bool),
    Like(String),
    Ilike(String),
}

impl Predicate {
    pub fn operator(&self) -> Operator {
        match self {
            Predicate::Eq(_) => Operator::Eq,
            Predicate::Neq(_) => Operator::Neq,
            Predicate::Gt(_) => Operator::Gt,
            Predicate::Gte(_) => Operator::Gte,
            Predicate::Lt(_) => Operator::Lt,
            Predicate::Lte(_) => Operator::Lte,
            Predicate::Inq(_) => Operator::Inq,
            Predicate::Nin(_) => Operator::Nin,
            Predicate::Between(_, _) => Operator::Between,
            Predicate::Exists(_) => Operator::Exists,
            Predicate::Like(_) => Operator::Like,
            Predicate::Ilike(_) => Operator::Ilike,
        }
    }

    /// Build a predicate from a `where`-style operand.
    ///
    /// A scalar given to `inq`/`nin` becomes a one-element list; `between`
    /// needs an array of at most two elements (`null` = absent bound).
    pub fn from_operator(operator: Operator, operand: Value) -> Result<Self> {
        Ok(match operator {
            Operator::Eq => Predicate::Eq(operand),
            Operator::Neq => Predicate::Neq(operand),
            Operator::Gt => Predicate::Gt(operand),
            Operator::Gte => Predicate::Gte(operand),
            Operator::Lt => Predicate::Lt(operand),
            Operator::Lte => Predicate::Lte(operand),
            Operator::Inq => Predicate::Inq(into_list(operand)),
            Operator::Nin => Predicate::Nin(into_list(operand)),
            Operator::Between => {
                let Value::Array(bounds) = operand else {
                    return Err(QueryError::invalid_filter(
                        "between expects a two-element array",
                    ));
                };
                if bounds.len() > 2 {
                    return Err(QueryError::invalid_filter(format!(
                        "between expects at most two bounds, got {}",
                        bounds.len()
                    )));
                }
                let mut bounds = bounds.into_iter().map(|b| (!b.is_null()).then_some(b));
                Predicate::Between(bounds.next().flatten(), bounds.next().flatten())
            }
            Operator::Exists => Predicate::Exists(match &operand {
                Value::Bool(b) => *b,
                Value::String(s) if s == "true" => true,
                Value::String(s) if s == "false" => false,
                other => {
                    return Err(QueryError::invalid_filter(format!(
                        "exists expects a boolean, got {}",
                        other
                    )))
                }
            }),
            Operator::Like | Operator::Ilike => {
                let Value::String(pattern) = operand else {
                    return Err(QueryError::invalid_filter(format!(
                        "{} expects a string pattern",
                        operator
                    )));
                };
                if operator == Operator::Like {
                    Predicate::Like(pattern)
                } else {
                    Predicate::Ilike(pattern)
                }
            }
        })
    }
}

fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        scalar => vec![scalar],
    }
}

/// Single field comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Dotted path
    pub field: String,
    pub predicate: Predicate,
}

impl Comparison {
    pub fn new(field: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            field: field.into(),
            predicate,
        }
    }

    pub fn operator(&self) -> Operator {
        self.predicate.operator()
    }

    /// Expand an equality on a plain object into dotted leaf comparisons.
    ///
    /// `eq(meta, {color: "red", size: {gt: 3}})` becomes
    /// `[eq(meta.color, "red"), gt(meta.size, 3)]`. Keys that are operator
    /// names apply that operator to the current path. Everything that is not
    /// an equality on a non-empty plain object is returned unchanged.
    pub fn expand(&self) -> Vec<Comparison> {
        let mut out = Vec::new();
        expand_into(&self.field, &self.predicate, &mut out);
        out
    }
}

fn is_plain_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if !map.is_empty()) && as_native_date(value).is_none()
}

fn expand_into(field: &str, predicate: &Predicate, out: &mut Vec<Comparison>) {
    let Predicate::Eq(value @ Value::Object(map)) = predicate else {
        out.push(Comparison::new(field, predicate.clone()));
        return;
    };
    if !is_plain_object(value) {
        out.push(Comparison::new(field, predicate.clone()));
        return;
    }

    for (key, nested) in map {
        let operator_predicate = Operator::from_name(key)
            .and_then(|op| Predicate::from_operator(op, nested.clone()).ok());
        match operator_predicate {
            Some(Predicate::Eq(inner)) => expand_into(field, &Predicate::Eq(inner), out),
            Some(p) => out.push(Comparison::new(field, p)),
            None => expand_into(&format!("{}.{}", field, key), &Predicate::Eq(nested.clone()), out),
        }
    }
}

/// Filter Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterExpr {
    /// No constraint: matches every record
    #[default]
    Empty,
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Compare(Comparison),
}

impl FilterExpr {
    pub fn is_empty(&self) -> bool {
        matches!(self, FilterExpr::Empty)
    }

    /// Conjunction; `Empty` children are dropped and an all-empty
    /// conjunction collapses to `Empty`.
    pub fn and(children: Vec<FilterExpr>) -> Self {
        let children: Vec<FilterExpr> = children.into_iter().filter(|c| !c.is_empty()).collect();
        if children.is_empty() {
            FilterExpr::Empty
        } else {
            FilterExpr::And(children)
        }
    }

    /// Disjunction; an `Empty` child makes the whole disjunction `Empty`.
    /// `or(vec![])` matches nothing.
    pub fn or(children: Vec<FilterExpr>) -> Self {
        if children.iter().any(FilterExpr::is_empty) {
            return FilterExpr::Empty;
        }
        FilterExpr::Or(children)
    }

    /// `self AND other`
    pub fn and_with(self, other: FilterExpr) -> Self {
        match (self, other) {
            (FilterExpr::Empty, other) => other,
            (this, FilterExpr::Empty) => this,
            (this, other) => FilterExpr::And(vec![this, other]),
        }
    }

    pub fn compare(field: impl Into<String>, predicate: Predicate) -> Self {
        FilterExpr::Compare(Comparison::new(field, predicate))
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Predicate::Eq(value.into()))
    }

    pub fn neq(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Predicate::Neq(value.into()))
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Predicate::Gt(value.into()))
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Predicate::Gte(value.into()))
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Predicate::Lt(value.into()))
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Predicate::Lte(value.into()))
    }

    pub fn inq<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::compare(field, Predicate::Inq(values.into_iter().map(Into::into).collect()))
    }

    pub fn nin<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::compare(field, Predicate::Nin(values.into_iter().map(Into::into).collect()))
    }

    pub fn between(field: &str, low: Option<Value>, high: Option<Value>) -> Self {
        Self::compare(field, Predicate::Between(low, high))
    }

    pub fn exists(field: &str, present: bool) -> Self {
        Self::compare(field, Predicate::Exists(present))
    }

    pub fn like(field: &str, pattern: impl Into<String>) -> Self {
        Self::compare(field, Predicate::Like(pattern.into()))
    }

    pub fn ilike(field: &str, pattern: impl Into<String>) -> Self {
        Self::compare(field, Predicate::Ilike(pattern.into()))
    }

    /// All comparisons in the tree, depth-first
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            FilterExpr::Empty => {}
            FilterExpr::And(children) | FilterExpr::Or(children) => {
                for child in children {
                    child.collect_comparisons(out);
                }
            }
            FilterExpr::Compare(comparison) => out.push(comparison),
        }
    }

    /// Nesting depth (`Empty` and comparisons are depth 1)
    pub fn depth(&self) -> usize {
        match self {
            FilterExpr::And(children) | FilterExpr::Or(children) => {
                1 + children.iter().map(FilterExpr::depth).max().unwrap_or(0)
            }
            _ => 1,
        }
    }
}
