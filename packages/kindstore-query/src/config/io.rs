//! Configuration I/O (YAML schema)
//!
//! ```yaml
//! version: 1
//! date_fields: [_createdDateTime, _lastUpdatedDateTime, _validFromDateTime, _validUntilDateTime]
//! families:
//!   entity:
//!     collection: GenericEntity
//!     response_limit: 100
//!     defaults:
//!       limit: 50
//!       order: ["_createdDateTime DESC"]
//!     record_limits:
//!       - { scope: "where[_kind]=book", limit: 10 }
//!     uniqueness:
//!       - { scope: "where[_kind]=${_kind}&where[_slug]=${_slug}" }
//!     kinds:
//!       book:
//!         record_limits:
//!           - { scope: "where[_kind]=book&where[_ownerUsers]=${_ownerUsers}", limit: 5, duration: 30d }
//! ```
//!
//! Rule entries stay untyped here; they are validated by `rules`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::query::QueryDefaults;
use crate::domain::record::RecordFamily;

/// YAML Schema v1
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileV1 {
    /// Schema version (always 1 for v1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    /// Field names holding instants; defaults to the managed timestamps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_fields: Option<Vec<String>>,

    #[serde(default)]
    pub families: HashMap<RecordFamily, FamilySection>,
}

/// Per-family section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FamilySection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Ceiling applied to requested limits (0 = uncapped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_limit: Option<u64>,

    #[serde(default)]
    pub defaults: QueryDefaults,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub record_limits: Vec<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uniqueness: Vec<Value>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub kinds: HashMap<String, KindSection>,
}

/// Per-kind overrides inside a family
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<QueryDefaults>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub record_limits: Vec<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uniqueness: Vec<Value>,
}
