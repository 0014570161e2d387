//! Configuration error types

use thiserror::Error;

/// Configuration error type
///
/// Every variant is fatal: the engine must not start with a rule set it
/// cannot parse. Recoverable problems (an unparsable duration inside an
/// otherwise valid rule) are logged instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing version field in YAML
    #[error("Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    /// Unsupported version
    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    /// A scope rule entry that cannot be used
    #[error("Invalid rule {location}: {reason}")]
    InvalidRule { location: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error (rule lists from the environment)
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    pub fn invalid_rule(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
