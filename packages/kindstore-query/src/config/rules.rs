//! Scope rules: `{scope, limit, duration?}` entries
//!
//! Validation policy:
//! - not an object, missing/empty/unparsable scope, bad limit → fatal
//! - a literal `where` or `set` part that is not a valid filter or Set → fatal
//! - unparsable duration → warning, the rule keeps no window

use serde_json::{Map, Value};
use std::slice;
use tracing::warn;

use super::error::{ConfigError, ConfigResult};
use crate::domain::duration::DurationSpec;
use crate::features::scope::ScopeTemplate;

/// Record-limit rule or uniqueness rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// At most `limit` records may match the scope
    RecordLimit,
    /// No existing record may match the scope
    Uniqueness,
}

impl RuleKind {
    fn allowed_keys(&self) -> &'static [&'static str] {
        match self {
            RuleKind::RecordLimit => &["scope", "limit", "duration"],
            RuleKind::Uniqueness => &["scope", "duration"],
        }
    }
}

/// Validated scope rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRule {
    pub template: ScopeTemplate,
    /// Uniqueness rules carry 1: a single match is a violation
    pub limit: u64,
    pub duration: Option<DurationSpec>,
}

impl ScopeRule {
    pub fn new(scope: &str, limit: u64) -> ConfigResult<Self> {
        let template = ScopeTemplate::parse(scope)
            .map_err(|e| ConfigError::invalid_rule(format!("'{}'", scope), e.message))?;
        Ok(Self {
            template,
            limit,
            duration: None,
        })
    }

    pub fn unique(scope: &str) -> ConfigResult<Self> {
        Self::new(scope, 1)
    }

    pub fn with_duration(mut self, duration: DurationSpec) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn scope(&self) -> &str {
        self.template.source()
    }

    /// Validate one raw entry; `location` is used in messages
    pub fn from_value(value: &Value, kind: RuleKind, location: &str) -> ConfigResult<Self> {
        let Value::Object(entry) = value else {
            return Err(ConfigError::invalid_rule(location, "rule must be an object"));
        };
        for key in entry.keys() {
            if !kind.allowed_keys().contains(&key.as_str()) {
                return Err(ConfigError::invalid_rule(
                    location,
                    format!("unknown key '{}'", key),
                ));
            }
        }

        let scope = match entry.get("scope") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.as_str(),
            Some(Value::String(_)) => {
                return Err(ConfigError::invalid_rule(location, "scope must not be empty"))
            }
            Some(_) => return Err(ConfigError::invalid_rule(location, "scope must be a string")),
            None => return Err(ConfigError::invalid_rule(location, "scope is required")),
        };
        let template = ScopeTemplate::parse(scope)
            .map_err(|e| ConfigError::invalid_rule(location, e.message))?;

        let limit = match kind {
            RuleKind::Uniqueness => 1,
            RuleKind::RecordLimit => parse_limit(entry, location)?,
        };

        Ok(Self {
            template,
            limit,
            duration: parse_duration(entry, location),
        })
    }
}

fn parse_limit(entry: &Map<String, Value>, location: &str) -> ConfigResult<u64> {
    match entry.get("limit") {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            ConfigError::invalid_rule(location, format!("limit must be a non-negative integer, got {}", n))
        }),
        Some(other) => Err(ConfigError::invalid_rule(
            location,
            format!("limit must be a non-negative integer, got {}", other),
        )),
        None => Err(ConfigError::invalid_rule(location, "limit is required")),
    }
}

fn parse_duration(entry: &Map<String, Value>, location: &str) -> Option<DurationSpec> {
    let raw = entry.get("duration")?;
    let parsed = match raw {
        Value::Null => return None,
        Value::String(s) => s.parse::<DurationSpec>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        warn!(
            rule = location,
            duration = %raw,
            "Ignoring unparsable rule duration; the rule applies without a window"
        );
    }
    parsed
}

/// Ordered list of validated rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleList {
    rules: Vec<ScopeRule>,
}

impl RuleList {
    pub fn new(rules: Vec<ScopeRule>) -> Self {
        Self { rules }
    }

    pub fn from_values(values: &[Value], kind: RuleKind, location: &str) -> ConfigResult<Self> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| ScopeRule::from_value(value, kind, &format!("{}[{}]", location, i)))
            .collect::<ConfigResult<Vec<_>>>()
            .map(Self::new)
    }

    /// Parse the JSON array form used in process configuration
    pub fn from_json_str(input: &str, kind: RuleKind, location: &str) -> ConfigResult<Self> {
        match serde_json::from_str::<Value>(input)? {
            Value::Array(values) => Self::from_values(&values, kind, location),
            _ => Err(ConfigError::invalid_rule(location, "expected a JSON array of rules")),
        }
    }

    pub fn iter(&self) -> slice::Iter<'_, ScopeRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleList {
    type Item = &'a ScopeRule;
    type IntoIter = slice::Iter<'a, ScopeRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
