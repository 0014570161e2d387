//! Placeholder paths: `owner.id`, `authors[0].name`, `matrix[1][2]`
//!
//! Two productions only: a dot-separated key and a bracketed array index.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::record::RecordView;
use crate::error::{QueryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderPath {
    segments: Vec<PathSegment>,
}

impl PlaceholderPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Walk the record; `None` when any segment is missing
    pub fn resolve<'a>(&self, record: RecordView<'a>) -> Option<&'a Value> {
        let mut current = record;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Key(key) => current.key(key)?,
                PathSegment::Index(index) => current.index(*index)?,
            };
        }
        Some(current.as_value())
    }
}

impl FromStr for PlaceholderPath {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            QueryError::invalid_filter(format!("Invalid placeholder path '{}': {}", s, reason))
        };

        let mut segments = Vec::new();
        for part in s.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(idx) => (&part[..idx], &part[idx..]),
                None => (part, ""),
            };
            if key.is_empty() {
                return Err(invalid("empty key"));
            }
            segments.push(PathSegment::Key(key.to_string()));

            while !rest.is_empty() {
                let inner = rest
                    .strip_prefix('[')
                    .and_then(|r| r.split_once(']'))
                    .ok_or_else(|| invalid("unbalanced brackets"))?;
                let index = inner
                    .0
                    .parse::<usize>()
                    .map_err(|_| invalid("array index must be a non-negative integer"))?;
                segments.push(PathSegment::Index(index));
                rest = inner.1;
            }
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for PlaceholderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}
