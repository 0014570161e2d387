//! Value semantics shared by the in-memory matcher and the document store
//!
//! - Path resolution with array fan-out (`resolve_path`)
//! - Cross-type ordering (`compare_values`, `sort_order`)
//! - Native instants (`{"$date": "..."}`) and date-field coercion

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

use super::record::fields;

/// Key of the native instant wrapper object
pub const DATE_KEY: &str = "$date";

// ═══════════════════════════════════════════════════════════════════════════
// Instants
// ═══════════════════════════════════════════════════════════════════════════

/// Parse a wire timestamp (RFC 3339)
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Canonical wire form: RFC 3339, millisecond precision, `Z` suffix
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Native instant value
pub fn native_date(instant: DateTime<Utc>) -> Value {
    let mut map = Map::new();
    map.insert(DATE_KEY.to_string(), Value::String(format_instant(instant)));
    Value::Object(map)
}

/// Read a native instant back
pub fn as_native_date(value: &Value) -> Option<DateTime<Utc>> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get(DATE_KEY)?.as_str().and_then(parse_instant)
}

/// Coerce a wire value into a native instant when it parses as one.
///
/// Arrays are coerced element-wise; anything unparsable passes through.
pub fn coerce_date_value(value: &Value) -> Value {
    match value {
        Value::String(s) => match parse_instant(s) {
            Some(instant) => native_date(instant),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(coerce_date_value).collect()),
        other => other.clone(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Date fields
// ═══════════════════════════════════════════════════════════════════════════

/// Set of field names whose values are instants
///
/// Matching uses the last path segment, so `_entity._createdDateTime` and
/// `meta.audit._lastUpdatedDateTime` are recognised like the bare names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFields {
    names: HashSet<String>,
}

impl DateFields {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_date_field(&self, path: &str) -> bool {
        let last = path.rsplit('.').next().unwrap_or(path);
        self.names.contains(last)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Coerce every date field of a record (recursively) to native instants
    pub fn coerce_record(&self, record: &Value) -> Value {
        match record {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let coerced = if self.names.contains(k.as_str()) {
                            coerce_date_value(v)
                        } else {
                            self.coerce_record(v)
                        };
                        (k.clone(), coerced)
                    })
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.coerce_record(v)).collect())
            }
            other => other.clone(),
        }
    }
}

impl Default for DateFields {
    fn default() -> Self {
        Self::new(fields::DEFAULT_DATE_FIELDS)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Path resolution
// ═══════════════════════════════════════════════════════════════════════════

/// Resolve a dotted path into its candidate values.
///
/// `None` marks a missing value. Non-numeric segments fan out over arrays,
/// numeric segments index them, and a terminal array contributes itself
/// followed by each of its elements.
pub fn resolve_path<'a>(doc: &'a Value, path: &str) -> Vec<Option<&'a Value>> {
    let segments: Vec<&str> = if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    };
    let mut out = Vec::new();
    walk(doc, &segments, &mut out);
    out
}

fn walk<'a>(current: &'a Value, segments: &[&str], out: &mut Vec<Option<&'a Value>>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(Some(current));
        if let Value::Array(items) = current {
            out.extend(items.iter().map(Some));
        }
        return;
    };

    match current {
        Value::Object(map) => match map.get(*head) {
            Some(next) => walk(next, rest, out),
            None => out.push(None),
        },
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                match items.get(index) {
                    Some(next) => walk(next, rest, out),
                    None => out.push(None),
                }
            } else if items.is_empty() {
                out.push(None);
            } else {
                for item in items {
                    walk(item, segments, out);
                }
            }
        }
        _ => out.push(None),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Comparison
// ═══════════════════════════════════════════════════════════════════════════

/// Compare two values of the same type class.
///
/// - Numbers: compared as f64
/// - Strings: lexicographic
/// - Booleans: false < true
/// - Native instants: chronological
/// - Null == Null
/// - Anything else (including mismatched classes): `None`
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_native_date(left), as_native_date(right)) {
        return Some(a.cmp(&b));
    }
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Structural equality with numeric and instant awareness
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            if let (Some(x), Some(y)) = (as_native_date(left), as_native_date(right)) {
                return x == y;
            }
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => compare_values(left, right) == Some(Ordering::Equal),
    }
}

fn type_rank(value: &Value) -> u8 {
    if as_native_date(value).is_some() {
        return 6;
    }
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order used for sorting: missing/null first, then by type class,
/// then by value within a class.
pub fn sort_order(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let left = left.unwrap_or(&Value::Null);
    let right = right.unwrap_or(&Value::Null);
    match type_rank(left).cmp(&type_rank(right)) {
        Ordering::Equal => compare_values(left, right).unwrap_or(Ordering::Equal),
        other => other,
    }
}

/// First value found at a path (no fan-out), used for sort keys and field derivation
pub fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
