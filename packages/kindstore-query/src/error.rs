//! Error types for kindstore-query

use std::fmt;
use thiserror::Error;

use crate::domain::record::RecordFamily;

/// Query engine error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Storage collaborator failures (count/aggregate)
    Storage,
    /// Serialization/deserialization errors
    Serialization,
    /// Malformed inbound filter or query string
    InvalidFilter,
    /// A record-limit rule was reached
    LimitExceeded,
    /// A uniqueness rule already has a matching record
    UniquenessViolation,
    /// Configuration errors
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Storage => "storage",
            ErrorKind::Serialization => "serialization",
            ErrorKind::InvalidFilter => "invalid_filter",
            ErrorKind::LimitExceeded => "limit_exceeded",
            ErrorKind::UniquenessViolation => "uniqueness_violation",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Query engine error type
///
/// `details` carries structured, machine-readable context (for limit
/// violations: the configured limit, the interpolated scope, kind and family).
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct QueryError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
    pub details: serde_json::Value,
    code: Option<&'static str>,
}

impl QueryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: serde_json::Value::Null,
            code: None,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Stable machine-readable code (`ENTITY-LIMIT-EXCEEDED`, ...).
    ///
    /// Falls back to the error kind for errors that are not domain violations.
    pub fn code(&self) -> &'static str {
        self.code.unwrap_or_else(|| self.kind.as_str())
    }

    // Convenience constructors
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFilter, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn limit_exceeded(family: RecordFamily, message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::LimitExceeded, message);
        err.code = Some(family.limit_exceeded_code());
        err
    }

    pub fn uniqueness_violation(family: RecordFamily, message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::UniquenessViolation, message);
        err.code = Some(family.uniqueness_violation_code());
        err
    }

    /// True for quota/uniqueness violations, which callers must not retry.
    pub fn is_violation(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::LimitExceeded | ErrorKind::UniquenessViolation
        )
    }
}

// JSON error conversions
impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::serialization(format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<crate::config::ConfigError> for QueryError {
    fn from(err: crate::config::ConfigError) -> Self {
        QueryError::config(err.to_string()).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, QueryError>;
