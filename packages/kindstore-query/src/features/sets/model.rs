//! Set model and parsing from the bracketed `set[...]` syntax

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::duration::DurationSpec;
use crate::domain::record::Visibility;
use crate::error::{QueryError, Result};
use crate::parsing::query_string;

const EXPIREDS_PREFIX: &str = "expireds-";
const CREATEDS_PREFIX: &str = "createds-";

/// User and group identifiers for `owners` / `audience`
///
/// `None` means the half was not given; it is omitted from the compiled
/// expression rather than matched against an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principals {
    pub user_ids: Option<Vec<String>>,
    pub group_ids: Option<Vec<String>>,
}

impl Principals {
    pub fn new(user_ids: Option<Vec<String>>, group_ids: Option<Vec<String>>) -> Self {
        Self { user_ids, group_ids }
    }

    pub fn users<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            user_ids: Some(ids.into_iter().map(Into::into).collect()),
            group_ids: None,
        }
    }

    pub fn with_groups<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.group_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_ids.is_none() && self.group_ids.is_none()
    }

    fn from_value(name: &str, value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(QueryError::invalid_filter(format!(
                "set[{}] expects userIds and/or groupIds",
                name
            )));
        };
        let mut principals = Principals::default();
        for (key, ids) in map {
            match key.as_str() {
                "userIds" => principals.user_ids = id_list(ids),
                "groupIds" => principals.group_ids = id_list(ids),
                other => debug!(set = name, key = other, "Ignoring unknown principal key"),
            }
        }
        Ok(principals)
    }
}

/// Comma-separated list (or array) of identifiers; blank entries are skipped
/// and an empty result counts as absent.
fn id_list(value: &Value) -> Option<Vec<String>> {
    let ids: Vec<String> = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items.iter().filter_map(id_list).flatten().collect(),
        Value::Number(n) => vec![n.to_string()],
        _ => Vec::new(),
    };
    (!ids.is_empty()).then_some(ids)
}

/// One named predicate of a Set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetPredicate {
    /// `publics` / `privates` / `protecteds`
    Visibility(Visibility),
    Actives,
    Expireds(DurationSpec),
    Createds(DurationSpec),
    Owners(Principals),
    Audience(Principals),
    And(Vec<Set>),
    Or(Vec<Set>),
}

/// Declarative named-predicate query, conjunctive over its predicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Set {
    pub predicates: Vec<SetPredicate>,
}

impl Set {
    pub fn new(predicates: Vec<SetPredicate>) -> Self {
        Self { predicates }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn with(mut self, predicate: SetPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Parse the `set[...]` part of a query string; other keys are ignored
    pub fn from_query_string(input: &str) -> Result<Self> {
        let tree = query_string::parse(input)?;
        match tree.get("set") {
            Some(set) => Self::from_value(set),
            None => Ok(Self::default()),
        }
    }

    /// Parse a Set from its nested form.
    ///
    /// Unknown predicate names are skipped. A flag set to anything but
    /// `true` is skipped as well.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Self::from_map(map),
            other => Err(QueryError::invalid_filter(format!(
                "set must be an object, got {}",
                other
            ))),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let mut predicates = Vec::with_capacity(map.len());

        for (name, params) in map {
            let predicate = match name.as_str() {
                "publics" => flag(name, params).then_some(SetPredicate::Visibility(Visibility::Public)),
                "privates" => {
                    flag(name, params).then_some(SetPredicate::Visibility(Visibility::Private))
                }
                "protecteds" => {
                    flag(name, params).then_some(SetPredicate::Visibility(Visibility::Protected))
                }
                "actives" => flag(name, params).then_some(SetPredicate::Actives),
                "owners" => Some(SetPredicate::Owners(Principals::from_value(name, params)?)),
                "audience" => Some(SetPredicate::Audience(Principals::from_value(name, params)?)),
                "and" => Some(SetPredicate::And(nested_sets(name, params)?)),
                "or" => Some(SetPredicate::Or(nested_sets(name, params)?)),
                other => duration_predicate(other, params),
            };
            predicates.extend(predicate);
        }

        Ok(Self { predicates })
    }
}

fn flag(name: &str, value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true" || s == "1",
        _ => {
            debug!(set = name, value = %value, "Ignoring non-boolean set flag");
            false
        }
    }
}

fn nested_sets(name: &str, value: &Value) -> Result<Vec<Set>> {
    let Value::Array(items) = value else {
        return Err(QueryError::invalid_filter(format!(
            "set[{}] expects a list of sets",
            name
        )));
    };
    items.iter().map(Set::from_value).collect()
}

fn duration_predicate(name: &str, params: &Value) -> Option<SetPredicate> {
    let (build, window): (fn(DurationSpec) -> SetPredicate, &str) =
        if let Some(window) = name.strip_prefix(EXPIREDS_PREFIX) {
            (SetPredicate::Expireds, window)
        } else if let Some(window) = name.strip_prefix(CREATEDS_PREFIX) {
            (SetPredicate::Createds, window)
        } else {
            debug!(set = name, "Ignoring unknown set predicate");
            return None;
        };

    if !flag(name, params) {
        return None;
    }
    match window.parse::<DurationSpec>() {
        Ok(duration) => Some(build(duration)),
        Err(e) => {
            warn!(set = name, error = %e.message, "Ignoring set predicate with invalid duration");
            None
        }
    }
}
