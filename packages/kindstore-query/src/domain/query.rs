//! Inbound query filter: `where`, `fields`, `order`, `skip`, `limit`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::filter::FilterExpr;
use crate::error::{QueryError, Result};
use crate::parsing::{query_string, where_clause};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Native sort value (`1` / `-1`)
    pub fn as_native(&self) -> i64 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) if s.eq_ignore_ascii_case("asc") || s == "1" => Ok(SortDirection::Asc),
            Value::String(s) if s.eq_ignore_ascii_case("desc") || s == "-1" => {
                Ok(SortDirection::Desc)
            }
            Value::Number(n) if n.as_i64() == Some(1) => Ok(SortDirection::Asc),
            Value::Number(n) if n.as_i64() == Some(-1) => Ok(SortDirection::Desc),
            other => Err(QueryError::invalid_filter(format!(
                "Invalid sort direction: {}",
                other
            ))),
        }
    }
}

/// One `field ASC|DESC` sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

impl FromStr for SortKey {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| QueryError::invalid_filter("Empty order clause"))?;
        let direction = match parts.next() {
            None => SortDirection::Asc,
            Some(d) => SortDirection::from_value(&Value::String(d.to_string()))?,
        };
        if parts.next().is_some() {
            return Err(QueryError::invalid_filter(format!(
                "Invalid order clause: '{}'",
                s
            )));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

impl TryFrom<String> for SortKey {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction.as_str())
    }
}

/// Projection mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum FieldSelection {
    /// Only the named fields, plus the identifier and derived metadata
    /// fields unless they appear in `except`
    Include {
        fields: Vec<String>,
        except: Vec<String>,
    },
    /// Everything but the named fields
    Exclude(Vec<String>),
}

impl FieldSelection {
    pub fn include<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        FieldSelection::Include {
            fields: fields.into_iter().map(Into::into).collect(),
            except: Vec::new(),
        }
    }

    pub fn exclude<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        FieldSelection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Array → inclusion; map of booleans → inclusion of the `true` keys when
    /// any is true (the `false` keys become exceptions), otherwise exclusion
    /// of the `false` keys.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(FieldSelection::include(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        other => Err(QueryError::invalid_filter(format!(
                            "fields entries must be strings, got {}",
                            other
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?,
            )),
            Value::String(single) => Ok(FieldSelection::include([single.clone()])),
            Value::Object(map) => {
                let mut included = Vec::new();
                let mut excluded = Vec::new();
                for (field, flag) in map {
                    if truthy(flag)? {
                        included.push(field.clone());
                    } else {
                        excluded.push(field.clone());
                    }
                }
                Ok(if included.is_empty() {
                    FieldSelection::Exclude(excluded)
                } else {
                    FieldSelection::Include {
                        fields: included,
                        except: excluded,
                    }
                })
            }
            other => Err(QueryError::invalid_filter(format!(
                "fields must be an array or an object, got {}",
                other
            ))),
        }
    }

    /// Map form (`{field: true|false}`)
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        match self {
            FieldSelection::Include { fields, except } => {
                for f in fields {
                    map.insert(f.clone(), Value::Bool(true));
                }
                for f in except {
                    map.insert(f.clone(), Value::Bool(false));
                }
            }
            FieldSelection::Exclude(fields) => {
                for f in fields {
                    map.insert(f.clone(), Value::Bool(false));
                }
            }
        }
        Value::Object(map)
    }
}

impl TryFrom<Value> for FieldSelection {
    type Error = QueryError;

    fn try_from(value: Value) -> Result<Self> {
        FieldSelection::from_value(&value)
    }
}

impl From<FieldSelection> for Value {
    fn from(selection: FieldSelection) -> Self {
        selection.to_value()
    }
}

fn truthy(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64() != Some(0.0)),
        Value::String(s) if s == "true" || s == "1" => Ok(true),
        Value::String(s) if s == "false" || s == "0" => Ok(false),
        other => Err(QueryError::invalid_filter(format!(
            "fields flags must be booleans, got {}",
            other
        ))),
    }
}

fn parse_order(value: &Value) -> Result<Vec<SortKey>> {
    match value {
        Value::String(s) => Ok(vec![s.parse()?]),
        Value::Array(items) => items.iter().map(parse_order).collect::<Result<Vec<_>>>().map(
            |nested| nested.into_iter().flatten().collect(),
        ),
        Value::Object(map) => map
            .iter()
            .map(|(field, direction)| {
                Ok(SortKey {
                    field: field.clone(),
                    direction: SortDirection::from_value(direction)?,
                })
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(QueryError::invalid_filter(format!(
            "Invalid order clause: {}",
            other
        ))),
    }
}

fn parse_count(name: &str, value: &Value) -> Result<Option<u64>> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| QueryError::invalid_filter(format!("{} must be a non-negative integer, got {}", name, value)))
}

/// Per-family query defaults, merged field by field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<SortKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldSelection>,
}

impl QueryDefaults {
    /// Every `Some` in `overrides` replaces the corresponding default
    pub fn merge(self, overrides: QueryDefaults) -> QueryDefaults {
        QueryDefaults {
            limit: overrides.limit.or(self.limit),
            order: overrides.order.or(self.order),
            fields: overrides.fields.or(self.fields),
        }
    }
}

/// Parsed inbound filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub where_clause: FilterExpr,
    pub fields: Option<FieldSelection>,
    pub order: Vec<SortKey>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl Filter {
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            if value.is_null() {
                return Ok(Self::default());
            }
            return Err(QueryError::invalid_filter("filter must be an object"));
        };

        let mut filter = Filter::default();
        for (key, v) in map {
            match key.as_str() {
                "where" => filter.where_clause = where_clause::parse_where(v)?,
                "fields" => filter.fields = Some(FieldSelection::from_value(v)?),
                "order" => filter.order = parse_order(v)?,
                "skip" | "offset" => filter.skip = parse_count(key, v)?,
                "limit" => filter.limit = parse_count(key, v)?,
                other => {
                    return Err(QueryError::invalid_filter(format!(
                        "Unknown filter key '{}'",
                        other
                    )))
                }
            }
        }
        Ok(filter)
    }

    /// Parse the `filter[...]` part of a query string; other keys are ignored.
    ///
    /// Leaf values stay strings: `filter[where][_version][gt]=3` compares
    /// against the string `"3"` and so never matches a numeric `_version`.
    /// Typed operands go through [`Filter::from_json`].
    pub fn from_query_string(input: &str) -> Result<Self> {
        let tree = query_string::parse(input)?;
        match tree.get("filter") {
            Some(filter) => Self::from_json(filter),
            None => Ok(Self::default()),
        }
    }

    /// Fill unset parts from the defaults
    pub fn with_defaults(mut self, defaults: &QueryDefaults) -> Self {
        if self.limit.is_none() {
            self.limit = defaults.limit;
        }
        if self.order.is_empty() {
            if let Some(order) = &defaults.order {
                self.order = order.clone();
            }
        }
        if self.fields.is_none() {
            self.fields = defaults.fields.clone();
        }
        self
    }
}
