//! Evaluation of native query documents and stages over JSON documents
//!
//! Mirrors the In-Memory Matcher leaf for leaf: both read values through
//! `resolve_path`, treat missing as `null` and compare with the shared
//! value helpers. Each operator of a compound condition is checked on its
//! own against the field's candidates.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::query::SortDirection;
use crate::domain::record::fields;
use crate::domain::value::{
    as_native_date, compare_values, lookup_path, resolve_path, sort_order, values_equal,
};
use crate::error::{QueryError, Result};
use crate::features::native::translator::{native_regex, AND, NOR, OPTIONS, OR, REGEX};
use crate::features::native::Stage;

static NULL: Value = Value::Null;

/// True when `doc` satisfies the query document
pub fn matches_document(query: &Value, doc: &Value) -> Result<bool> {
    let Value::Object(clauses) = query else {
        return Err(QueryError::invalid_filter(format!(
            "query document must be an object, got {}",
            query
        )));
    };
    for (key, condition) in clauses {
        let satisfied = match key.as_str() {
            AND => branches(key, condition)?
                .iter()
                .try_fold(true, |acc, q| Ok::<_, QueryError>(acc && matches_document(q, doc)?))?,
            OR => branches(key, condition)?
                .iter()
                .try_fold(false, |acc, q| Ok::<_, QueryError>(acc || matches_document(q, doc)?))?,
            NOR => !branches(key, condition)?
                .iter()
                .try_fold(false, |acc, q| Ok::<_, QueryError>(acc || matches_document(q, doc)?))?,
            other if other.starts_with('$') => {
                return Err(QueryError::invalid_filter(format!(
                    "unsupported top-level operator '{}'",
                    other
                )))
            }
            field => matches_field(field, condition, doc)?,
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn branches<'q>(key: &str, condition: &'q Value) -> Result<&'q Vec<Value>> {
    condition
        .as_array()
        .ok_or_else(|| QueryError::invalid_filter(format!("{} expects an array", key)))
}

/// `{"$gt": 1, ...}` as opposed to a literal (including native instants)
fn is_operator_doc(condition: &Value) -> bool {
    match condition {
        Value::Object(map) => {
            !map.is_empty()
                && as_native_date(condition).is_none()
                && map.keys().all(|k| k.starts_with('$'))
        }
        _ => false,
    }
}

fn matches_field(field: &str, condition: &Value, doc: &Value) -> Result<bool> {
    let resolved = resolve_path(doc, field);
    let present = resolved.iter().any(Option::is_some);
    let candidates: Vec<&Value> = resolved.into_iter().map(|c| c.unwrap_or(&NULL)).collect();

    if !is_operator_doc(condition) {
        return Ok(candidates.iter().any(|v| values_equal(v, condition)));
    }
    let Value::Object(operators) = condition else {
        return Ok(false);
    };

    let equals_any = |operands: &[Value]| {
        candidates
            .iter()
            .any(|v| operands.iter().any(|o| values_equal(v, o)))
    };
    let range = |operand: &Value, accept: fn(Ordering) -> bool| {
        candidates
            .iter()
            .any(|v| compare_values(v, operand).is_some_and(accept))
    };
    let list = |op: &str, operand: &Value| -> Result<Vec<Value>> {
        operand
            .as_array()
            .cloned()
            .ok_or_else(|| QueryError::invalid_filter(format!("{} expects an array", op)))
    };

    for (op, operand) in operators {
        let satisfied = match op.as_str() {
            "$eq" => equals_any(std::slice::from_ref(operand)),
            "$ne" => !equals_any(std::slice::from_ref(operand)),
            "$gt" => range(operand, |o| o == Ordering::Greater),
            "$gte" => range(operand, |o| o != Ordering::Less),
            "$lt" => range(operand, |o| o == Ordering::Less),
            "$lte" => range(operand, |o| o != Ordering::Greater),
            "$in" => equals_any(&list(op, operand)?),
            "$nin" => !equals_any(&list(op, operand)?),
            "$exists" => present == truthy(operand),
            REGEX => {
                let options = operators.get(OPTIONS).and_then(Value::as_str).unwrap_or("");
                let pattern = operand.as_str().ok_or_else(|| {
                    QueryError::invalid_filter(format!("{} expects a string", REGEX))
                })?;
                let regex = native_regex(pattern, options).map_err(|e| {
                    QueryError::invalid_filter(format!("invalid regex '{}': {}", pattern, e))
                        .with_source(e)
                })?;
                candidates
                    .iter()
                    .any(|v| v.as_str().is_some_and(|s| regex.is_match(s)))
            }
            OPTIONS if operators.contains_key(REGEX) => true,
            other => {
                return Err(QueryError::invalid_filter(format!(
                    "unsupported operator '{}' on '{}'",
                    other, field
                )))
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Stages
// ═══════════════════════════════════════════════════════════════════════════

/// Run `stages` over `input`; `collections` backs `$lookup`
pub fn run_stages(
    stages: &[Stage],
    input: Vec<Value>,
    collections: &HashMap<String, Vec<Value>>,
) -> Result<Vec<Value>> {
    stages.iter().try_fold(input, |docs, stage| match stage {
        Stage::Match(query) => docs
            .into_iter()
            .filter_map(|doc| match matches_document(query, &doc) {
                Ok(true) => Some(Ok(doc)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .collect(),
        Stage::Lookup {
            from,
            local_field,
            foreign_field,
            alias,
        } => {
            let foreign = collections.get(from).map(Vec::as_slice).unwrap_or(&[]);
            Ok(docs
                .into_iter()
                .map(|doc| lookup(doc, foreign, local_field, foreign_field, alias))
                .collect())
        }
        Stage::Unwind { path } => Ok(docs.into_iter().flat_map(|doc| unwind(doc, path)).collect()),
        Stage::AddFields(computed) => Ok(docs
            .into_iter()
            .map(|mut doc| {
                for (name, expr) in computed {
                    if let Some(value) = derive(expr, &doc) {
                        set_path(&mut doc, name, value);
                    }
                }
                doc
            })
            .collect()),
        Stage::Project(projection) => Ok(docs.iter().map(|doc| project(doc, projection)).collect()),
        Stage::Sort(keys) => {
            let mut docs = docs;
            // stable: ties keep their input order
            docs.sort_by(|a, b| {
                keys.iter()
                    .map(|(field, direction)| {
                        let ord = sort_order(lookup_path(a, field), lookup_path(b, field));
                        match direction {
                            SortDirection::Asc => ord,
                            SortDirection::Desc => ord.reverse(),
                        }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
            Ok(docs)
        }
        Stage::Skip(n) => Ok(docs.into_iter().skip(*n as usize).collect()),
        Stage::Limit(n) => Ok(docs.into_iter().take(*n as usize).collect()),
    })
}

fn lookup(mut doc: Value, foreign: &[Value], local_field: &str, foreign_field: &str, alias: &str) -> Value {
    let locals: Vec<&Value> = resolve_path(&doc, local_field)
        .into_iter()
        .map(|c| c.unwrap_or(&NULL))
        .collect();
    let joined: Vec<Value> = foreign
        .iter()
        .filter(|f| {
            resolve_path(f, foreign_field)
                .into_iter()
                .map(|c| c.unwrap_or(&NULL))
                .any(|fv| locals.iter().any(|lv| values_equal(lv, fv)))
        })
        .cloned()
        .collect();
    set_path(&mut doc, alias, Value::Array(joined));
    doc
}

fn unwind(doc: Value, path: &str) -> Vec<Value> {
    match lookup_path(&doc, path).cloned() {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| {
                let mut copy = doc.clone();
                set_path(&mut copy, path, item);
                copy
            })
            .collect(),
        Some(_) => vec![doc],
    }
}

/// `"$a.b"` references, nested objects, literals; `None` when a reference is missing
fn derive(expr: &Value, doc: &Value) -> Option<Value> {
    match expr {
        Value::String(s) if s.starts_with('$') => lookup_path(doc, &s[1..]).cloned(),
        Value::Object(map) => Some(Value::Object(
            map.iter()
                .filter_map(|(k, v)| derive(v, doc).map(|d| (k.clone(), d)))
                .collect(),
        )),
        other => Some(other.clone()),
    }
}

fn project(doc: &Value, projection: &Map<String, Value>) -> Value {
    let excludes = projection
        .iter()
        .any(|(k, v)| k != fields::ID && !truthy(v));

    if excludes {
        let mut copy = doc.clone();
        for (path, flag) in projection {
            if !truthy(flag) {
                remove_path(&mut copy, path);
            }
        }
        return copy;
    }

    let mut out = Value::Object(Map::new());
    let keep_id = projection.get(fields::ID).map_or(true, truthy);
    if keep_id {
        if let Some(id) = doc.get(fields::ID) {
            set_path(&mut out, fields::ID, id.clone());
        }
    }
    for (path, flag) in projection {
        if path == fields::ID || !truthy(flag) {
            continue;
        }
        if let Some(value) = lookup_path(doc, path) {
            set_path(&mut out, path, value.clone());
        }
    }
    out
}

fn set_path(doc: &mut Value, path: &str, value: Value) {
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }
    let Value::Object(map) = doc else {
        return;
    };
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_path(child, rest, value);
        }
    }
}

fn remove_path(doc: &mut Value, path: &str) {
    match path.split_once('.') {
        None => {
            if let Value::Object(map) = doc {
                map.remove(path);
            }
        }
        Some((head, rest)) => {
            if let Some(child) = doc.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}
