//! Bracketed query-string notation
//!
//! `set[and][0][publics]=true&filter[where][_kind]=book` becomes
//!
//! ```json
//! { "set": { "and": [{ "publics": "true" }] }, "filter": { "where": { "_kind": "book" } } }
//! ```
//!
//! Objects whose keys are all array indices turn into arrays (ordered by
//! index, gaps compacted); `[]` appends; a repeated leaf key collects its
//! values into an array. Input is expected to be percent-decoded already.

use serde_json::{Map, Value};

use crate::error::{QueryError, Result};

/// One `key=value` pair with its bracket path split out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPair {
    /// `a[b][c]` → `["a", "b", "c"]`; `[]` yields an empty segment
    pub path: Vec<String>,
    pub value: String,
}

impl QueryPair {
    /// Re-render the bracket key (`a[b][c]`)
    pub fn key(&self) -> String {
        render_key(&self.path)
    }
}

pub fn render_key(path: &[String]) -> String {
    let mut out = String::new();
    for (i, segment) in path.iter().enumerate() {
        if i == 0 {
            out.push_str(segment);
        } else {
            out.push('[');
            out.push_str(segment);
            out.push(']');
        }
    }
    out
}

/// Split a query string into bracket-path pairs, preserving order
pub fn parse_pairs(input: &str) -> Result<Vec<QueryPair>> {
    let input = input.trim().trim_start_matches('?');
    let mut pairs = Vec::new();

    for part in input.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, value) = match part.split_once('=') {
            Some((k, v)) => (k, v),
            None => (part, ""),
        };
        pairs.push(QueryPair {
            path: parse_key(raw_key)?,
            value: value.to_string(),
        });
    }

    Ok(pairs)
}

fn parse_key(raw: &str) -> Result<Vec<String>> {
    let (base, mut rest) = match raw.find('[') {
        Some(idx) => (&raw[..idx], &raw[idx..]),
        None => (raw, ""),
    };
    if base.is_empty() {
        return Err(QueryError::invalid_filter(format!(
            "Query key '{}' has no name",
            raw
        )));
    }

    let mut path = vec![base.to_string()];
    while !rest.is_empty() {
        let Some(stripped) = rest.strip_prefix('[') else {
            return Err(QueryError::invalid_filter(format!(
                "Unexpected '{}' in query key '{}'",
                rest, raw
            )));
        };
        let Some(close) = stripped.find(']') else {
            return Err(QueryError::invalid_filter(format!(
                "Unbalanced brackets in query key '{}'",
                raw
            )));
        };
        path.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }

    Ok(path)
}

/// Build the nested value from already-typed pairs
pub fn build_tree<I>(pairs: I) -> Value
where
    I: IntoIterator<Item = (Vec<String>, Value)>,
{
    let mut root = Value::Object(Map::new());
    for (path, value) in pairs {
        insert(&mut root, &path, value);
    }
    normalize_arrays(root)
}

/// Parse a query string into a nested value with string leaves
pub fn parse(input: &str) -> Result<Value> {
    let pairs = parse_pairs(input)?;
    Ok(build_tree(
        pairs.into_iter().map(|p| (p.path, Value::String(p.value))),
    ))
}

fn insert(node: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        if node.is_null() || node.as_object().is_some_and(Map::is_empty) {
            *node = value;
        } else if let Value::Array(items) = node {
            items.push(value);
        } else {
            let previous = node.take();
            *node = Value::Array(vec![previous, value]);
        }
        return;
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };
    let key = if head.is_empty() {
        map.len().to_string()
    } else {
        head.clone()
    };
    let child = map.entry(key).or_insert(Value::Null);
    insert(child, rest, value);
}

fn normalize_arrays(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let all_indices = !map.is_empty() && map.keys().all(|k| k.parse::<usize>().is_ok());
            if all_indices {
                let mut indexed: Vec<(usize, Value)> = map
                    .into_iter()
                    .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, normalize_arrays(v))))
                    .collect();
                indexed.sort_by_key(|(i, _)| *i);
                Value::Array(indexed.into_iter().map(|(_, v)| v).collect())
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, normalize_arrays(v)))
                        .collect(),
                )
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_arrays).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs("set[owners][userIds]=u1,u2&limit=5").unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].path, vec!["set", "owners", "userIds"]);
        assert_eq!(pairs[0].value, "u1,u2");
        assert_eq!(pairs[0].key(), "set[owners][userIds]");
        assert_eq!(pairs[1].path, vec!["limit"]);
    }

    #[test]
    fn test_value_keeps_equals_signs() {
        let pairs = parse_pairs("where[note]=a=b").unwrap();
        assert_eq!(pairs[0].value, "a=b");
    }

    #[test]
    fn test_malformed_keys() {
        assert!(parse_pairs("where[_kind=book").is_err());
        assert!(parse_pairs("[x]=1").is_err());
        assert!(parse_pairs("where[a]x[b]=1").is_err());
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let value = parse("set[and][0][publics]=true&set[and][1][actives]=true").unwrap();
        assert_eq!(
            value,
            json!({ "set": { "and": [{ "publics": "true" }, { "actives": "true" }] } })
        );
    }

    #[test]
    fn test_sparse_indices_are_compacted() {
        let value = parse("a[5]=x&a[2]=y").unwrap();
        assert_eq!(value, json!({ "a": ["y", "x"] }));
    }

    #[test]
    fn test_append_and_repeated_keys() {
        assert_eq!(parse("a[]=1&a[]=2").unwrap(), json!({ "a": ["1", "2"] }));
        assert_eq!(parse("a=1&a=2&a=3").unwrap(), json!({ "a": ["1", "2", "3"] }));
    }

    #[test]
    fn test_leading_question_mark_and_empty_parts() {
        assert_eq!(parse("?a=1&&b").unwrap(), json!({ "a": "1", "b": "" }));
        assert_eq!(parse("").unwrap(), json!({}));
    }

    #[test]
    fn test_build_tree_with_typed_values() {
        let tree = build_tree(vec![
            (vec!["where".into(), "_version".into()], json!(3)),
            (vec!["where".into(), "_kind".into()], json!("book")),
        ]);
        assert_eq!(tree, json!({ "where": { "_version": 3, "_kind": "book" } }));
    }
}
