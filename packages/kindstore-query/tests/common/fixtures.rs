//! Record and configuration fixtures

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

/// Fixed evaluation instant used across the suite
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 14, 21, 0, 0).unwrap()
}

/// An entity record with the managed fields filled in
pub fn entity(id: &str, kind: &str, visibility: &str) -> Value {
    json!({
        "_id": id,
        "_kind": kind,
        "_name": format!("{} {}", kind, id),
        "_slug": id,
        "_visibility": visibility,
        "_createdDateTime": "2024-01-10T08:00:00.000Z",
        "_lastUpdatedDateTime": "2024-01-10T08:00:00.000Z",
    })
}

/// Records for the owners Set scenario: two match, one does not
pub fn owners_corpus() -> Vec<Value> {
    vec![
        json!({ "_id": "mine", "_ownerUsers": "user1", "_visibility": "private" }),
        json!({ "_id": "group", "_ownerGroups": "group1", "_visibility": "protected" }),
        json!({
            "_id": "other",
            "_ownerUsers": "user9",
            "_ownerGroups": "group9",
            "_visibility": "protected"
        }),
    ]
}

/// Lists, entities and the relations linking them
pub fn relation_corpus() -> (Vec<Value>, Vec<Value>, Vec<Value>) {
    let lists = vec![
        json!({ "_id": "l1", "_kind": "reading", "_name": "To read", "_slug": "to-read", "_visibility": "public" }),
        json!({ "_id": "l2", "_kind": "reading", "_name": "Secret", "_slug": "secret", "_visibility": "private" }),
    ];
    let entities = vec![
        entity("e1", "book", "public"),
        entity("e2", "book", "public"),
        entity("e3", "movie", "public"),
    ];
    let relations = vec![
        json!({ "_id": "r1", "_kind": "item", "_listId": "l1", "_entityId": "e1", "_createdDateTime": "2024-01-01T00:00:00Z" }),
        json!({ "_id": "r2", "_kind": "item", "_listId": "l1", "_entityId": "e3", "_createdDateTime": "2024-01-02T00:00:00Z" }),
        json!({ "_id": "r3", "_kind": "item", "_listId": "l2", "_entityId": "e2", "_createdDateTime": "2024-01-03T00:00:00Z" }),
        json!({ "_id": "r4", "_kind": "item", "_listId": "l1", "_entityId": "gone", "_createdDateTime": "2024-01-04T00:00:00Z" }),
    ];
    (lists, entities, relations)
}

pub const ENGINE_YAML: &str = r#"
version: 1
families:
  entity:
    response_limit: 50
    defaults:
      limit: 20
      order: ["_createdDateTime DESC"]
    record_limits:
      - { scope: "where[_kind]=book", limit: 2 }
      - { scope: "where[_kind]=${_kind}&where[_ownerUsers]=${_ownerUsers}", limit: 1, duration: 30d }
    uniqueness:
      - { scope: "where[_kind]=${_kind}&where[_slug]=${_slug}" }
  list:
    collection: Lists
    kinds:
      reading:
        defaults:
          limit: 5
"#;
