//! Record families and managed field names
//!
//! Every record, whatever its kind, carries the same underscore-prefixed
//! managed fields. The Set Compiler and the Limit Engine only ever reference
//! records through these names.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Managed field names
pub mod fields {
    pub const ID: &str = "_id";
    pub const KIND: &str = "_kind";
    pub const NAME: &str = "_name";
    pub const SLUG: &str = "_slug";
    pub const VISIBILITY: &str = "_visibility";
    pub const OWNER_USERS: &str = "_ownerUsers";
    pub const OWNER_GROUPS: &str = "_ownerGroups";
    pub const VIEWER_USERS: &str = "_viewerUsers";
    pub const VIEWER_GROUPS: &str = "_viewerGroups";
    pub const CREATED_DATE_TIME: &str = "_createdDateTime";
    pub const LAST_UPDATED_DATE_TIME: &str = "_lastUpdatedDateTime";
    pub const VALID_FROM_DATE_TIME: &str = "_validFromDateTime";
    pub const VALID_UNTIL_DATE_TIME: &str = "_validUntilDateTime";

    /// Relation-only foreign keys
    pub const LIST_ID: &str = "_listId";
    pub const ENTITY_ID: &str = "_entityId";

    /// Timestamps coerced to native instants unless configured otherwise
    pub const DEFAULT_DATE_FIELDS: [&str; 4] = [
        CREATED_DATE_TIME,
        LAST_UPDATED_DATE_TIME,
        VALID_FROM_DATE_TIME,
        VALID_UNTIL_DATE_TIME,
    ];
}

/// Visibility levels stored in `_visibility`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

/// Record family: each family lives in its own collection and has its own rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFamily {
    Entity,
    List,
    /// List–entity relation records
    Relation,
}

impl RecordFamily {
    pub const ALL: [RecordFamily; 3] = [
        RecordFamily::Entity,
        RecordFamily::List,
        RecordFamily::Relation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordFamily::Entity => "entity",
            RecordFamily::List => "list",
            RecordFamily::Relation => "relation",
        }
    }

    pub fn default_collection(&self) -> &'static str {
        match self {
            RecordFamily::Entity => "GenericEntity",
            RecordFamily::List => "List",
            RecordFamily::Relation => "ListToEntityRelation",
        }
    }

    pub fn limit_exceeded_code(&self) -> &'static str {
        match self {
            RecordFamily::Entity => "ENTITY-LIMIT-EXCEEDED",
            RecordFamily::List => "LIST-LIMIT-EXCEEDED",
            RecordFamily::Relation => "RELATION-LIMIT-EXCEEDED",
        }
    }

    pub fn uniqueness_violation_code(&self) -> &'static str {
        match self {
            RecordFamily::Entity => "ENTITY-UNIQUENESS-VIOLATION",
            RecordFamily::List => "LIST-UNIQUENESS-VIOLATION",
            RecordFamily::Relation => "RELATION-UNIQUENESS-VIOLATION",
        }
    }
}

impl fmt::Display for RecordFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only view over a JSON record
///
/// Placeholder resolution and the Limit Engine read records exclusively
/// through this view: object keys and array indices, nothing else.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    value: &'a Value,
}

impl<'a> RecordView<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    pub fn as_value(&self) -> &'a Value {
        self.value
    }

    /// Child by object key
    pub fn key(&self, key: &str) -> Option<RecordView<'a>> {
        self.value.as_object()?.get(key).map(RecordView::new)
    }

    /// Child by array index
    pub fn index(&self, index: usize) -> Option<RecordView<'a>> {
        self.value.as_array()?.get(index).map(RecordView::new)
    }

    pub fn str_field(&self, key: &str) -> Option<&'a str> {
        self.value.as_object()?.get(key)?.as_str()
    }

    pub fn id(&self) -> Option<&'a str> {
        self.str_field(fields::ID)
    }

    pub fn kind(&self) -> Option<&'a str> {
        self.str_field(fields::KIND)
    }
}
