//! Scope Interpolator
//!
//! A scope template such as
//!
//! ```text
//! where[_kind]=book&where[_ownerUsers]=${_ownerUsers}&set[createds-1d]=true
//! ```
//!
//! is parsed once (at configuration time) into `where` and `set` clauses.
//! Per record, every `${path}` is resolved against the record:
//!
//! - a value that is exactly one placeholder keeps the JSON type it resolves to
//! - placeholders embedded in text are spliced in as strings
//! - array values contribute their first element; an empty array is missing
//! - a missing placeholder drops the clause that references it (with a warning)
//!
//! Resolved `where` clauses become Filter Expression leaves, resolved `set`
//! clauses go through the Set Compiler, and both are ANDed together.
//!
//! Parsing also checks every placeholder-free part of the template as a
//! `where` filter or a Set, so a template that could never interpolate
//! cleanly is rejected up front.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use super::path::PlaceholderPath;
use crate::domain::filter::FilterExpr;
use crate::domain::record::{fields, RecordView};
use crate::error::{QueryError, Result};
use crate::features::sets::{self, Set};
use crate::parsing::query_string::{self, render_key};
use crate::parsing::where_clause;

const WHERE_SECTION: &str = "where";
const SET_SECTION: &str = "set";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fragment {
    Text(String),
    Placeholder(PlaceholderPath),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateValue {
    Literal(String),
    /// The whole value is one placeholder
    Placeholder(PlaceholderPath),
    /// Text with embedded placeholders
    Mixed(Vec<Fragment>),
}

impl TemplateValue {
    fn parse(raw: &str) -> Result<Self> {
        let mut fragments = Vec::new();
        let mut rest = raw;

        while let Some(start) = rest.find("${") {
            if start > 0 {
                fragments.push(Fragment::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                QueryError::invalid_filter(format!("Unterminated placeholder in '{}'", raw))
            })?;
            fragments.push(Fragment::Placeholder(after[..end].trim().parse()?));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            fragments.push(Fragment::Text(rest.to_string()));
        }

        Ok(match fragments.as_slice() {
            [] => TemplateValue::Literal(String::new()),
            [Fragment::Text(text)] => TemplateValue::Literal(text.clone()),
            [Fragment::Placeholder(path)] => TemplateValue::Placeholder(path.clone()),
            _ => TemplateValue::Mixed(fragments),
        })
    }

    /// `Err` carries the first placeholder that could not be resolved
    fn resolve(&self, record: RecordView<'_>) -> std::result::Result<Value, &PlaceholderPath> {
        match self {
            TemplateValue::Literal(text) => Ok(Value::String(text.clone())),
            TemplateValue::Placeholder(path) => resolve_placeholder(path, record).ok_or(path),
            TemplateValue::Mixed(fragments) => {
                let mut out = String::new();
                for fragment in fragments {
                    match fragment {
                        Fragment::Text(text) => out.push_str(text),
                        Fragment::Placeholder(path) => {
                            match resolve_placeholder(path, record).ok_or(path)? {
                                Value::Null => return Err(path),
                                Value::String(s) => out.push_str(&s),
                                other => out.push_str(&other.to_string()),
                            }
                        }
                    }
                }
                Ok(Value::String(out))
            }
        }
    }
}

fn resolve_placeholder(path: &PlaceholderPath, record: RecordView<'_>) -> Option<Value> {
    match path.resolve(record)? {
        Value::Array(items) => items.first().cloned(),
        other => Some(other.clone()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateClause {
    /// Key path below the section (`where[a][b]` → `["a", "b"]`)
    path: Vec<String>,
    value: TemplateValue,
}

/// Parsed scope template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTemplate {
    source: String,
    where_clauses: Vec<TemplateClause>,
    set_clauses: Vec<TemplateClause>,
}

impl ScopeTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let mut where_clauses = Vec::new();
        let mut set_clauses = Vec::new();

        for pair in query_string::parse_pairs(source)? {
            let Some((section, path)) = pair.path.split_first() else {
                continue;
            };
            if path.is_empty() {
                return Err(QueryError::invalid_filter(format!(
                    "Scope clause '{}' needs a field, e.g. {}[field]",
                    pair.key(),
                    section
                )));
            }
            let clause = TemplateClause {
                path: path.to_vec(),
                value: TemplateValue::parse(&pair.value)?,
            };
            match section.as_str() {
                WHERE_SECTION => where_clauses.push(clause),
                SET_SECTION => set_clauses.push(clause),
                other => {
                    return Err(QueryError::invalid_filter(format!(
                        "Unknown scope section '{}' (expected where or set)",
                        other
                    )))
                }
            }
        }

        let template = Self {
            source: source.to_string(),
            where_clauses,
            set_clauses,
        };
        template.validate_literals()?;
        Ok(template)
    }

    /// Run the literal parts through the `where` parser and the Set parser.
    /// A top-level field or set key with any placeholder below it is only
    /// checked at interpolation time.
    fn validate_literals(&self) -> Result<()> {
        let where_tree = literal_tree(&self.where_clauses);
        if where_tree.as_object().is_some_and(|m| !m.is_empty()) {
            where_clause::parse_where(&where_tree)?;
        }
        Set::from_value(&literal_tree(&self.set_clauses))?;
        Ok(())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_placeholders(&self) -> bool {
        self.where_clauses
            .iter()
            .chain(&self.set_clauses)
            .any(|c| !matches!(c.value, TemplateValue::Literal(_)))
    }

    /// The kind named by a literal `where[_kind]=X`, if any
    pub fn pinned_kind(&self) -> Option<&str> {
        self.where_clauses.iter().find_map(|clause| match (&clause.path[..], &clause.value) {
            ([field], TemplateValue::Literal(kind)) if field == fields::KIND => Some(kind.as_str()),
            _ => None,
        })
    }

    /// Materialize the template against a record
    pub fn interpolate(&self, record: &Value, now: DateTime<Utc>) -> Result<FilterExpr> {
        let view = RecordView::new(record);

        let where_tree = query_string::build_tree(self.resolve_clauses(&self.where_clauses, view));
        let where_expr = if where_tree.as_object().is_some_and(|m| m.is_empty()) {
            FilterExpr::Empty
        } else {
            where_clause::parse_where(&where_tree)?
        };

        let set_tree = query_string::build_tree(self.resolve_clauses(&self.set_clauses, view));
        let set_expr = sets::compile(&Set::from_value(&set_tree)?, now);

        Ok(where_expr.and_with(set_expr))
    }

    fn resolve_clauses(
        &self,
        clauses: &[TemplateClause],
        view: RecordView<'_>,
    ) -> Vec<(Vec<String>, Value)> {
        clauses
            .iter()
            .filter_map(|clause| match clause.value.resolve(view) {
                Ok(value) => Some((clause.path.clone(), value)),
                Err(missing) => {
                    warn!(
                        scope = %self.source,
                        clause = %render_key(&clause.path),
                        placeholder = %missing,
                        "Placeholder not found in record, dropping clause"
                    );
                    None
                }
            })
            .collect()
    }
}

fn literal_tree(clauses: &[TemplateClause]) -> Value {
    let templated: HashSet<&str> = clauses
        .iter()
        .filter(|c| !matches!(c.value, TemplateValue::Literal(_)))
        .filter_map(|c| c.path.first().map(String::as_str))
        .collect();

    query_string::build_tree(clauses.iter().filter_map(|clause| {
        let head = clause.path.first()?;
        match &clause.value {
            TemplateValue::Literal(text) if !templated.contains(head.as_str()) => {
                Some((clause.path.clone(), Value::String(text.clone())))
            }
            _ => None,
        }
    }))
}

impl FromStr for ScopeTemplate {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ScopeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// One-shot helper: parse and interpolate
pub fn interpolate(template: &str, record: &Value, now: DateTime<Utc>) -> Result<FilterExpr> {
    ScopeTemplate::parse(template)?.interpolate(record, now)
}
