//! Engine configuration
//!
//! Two ways in:
//!
//! ```rust,ignore
//! use kindstore_query::config::{EngineConfig, FamilyConfig, RuleKind, RuleList};
//! use kindstore_query::domain::RecordFamily;
//!
//! // Programmatic
//! let rules = RuleList::from_json_str(
//!     r#"[{"scope": "where[_kind]=book", "limit": 10}]"#,
//!     RuleKind::RecordLimit,
//!     "entity.record_limits",
//! )?;
//! let config = EngineConfig::new().with_family(
//!     RecordFamily::Entity,
//!     FamilyConfig::new(RecordFamily::Entity).with_record_limits(rules),
//! );
//!
//! // Versioned YAML
//! let config = EngineConfig::from_yaml_file("kindstore.yaml")?;
//! ```
//!
//! Every rule is validated at load time; a malformed rule never reaches the
//! Limit Engine.

pub mod engine_config;
pub mod error;
pub mod io;
pub mod rules;

pub use engine_config::{EngineConfig, FamilyConfig, KindConfig};
pub use error::{ConfigError, ConfigResult};
pub use io::{ConfigFileV1, FamilySection, KindSection};
pub use rules::{RuleKind, RuleList, ScopeRule};
