//! Typed aggregation stages and their document form

use serde_json::{json, Map, Value};

use crate::domain::query::SortDirection;

/// One staged operation of an aggregation pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// `{"$match": <query document>}`
    Match(Value),
    /// Join: attach the `from` documents whose `foreign_field` equals
    /// `local_field` as an array under `alias`
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        alias: String,
    },
    /// One output document per element of the array at `path`; documents
    /// with a missing or empty array are dropped
    Unwind { path: String },
    /// Computed fields; string values starting with `$` reference paths
    AddFields(Map<String, Value>),
    /// `1` includes, `0` excludes
    Project(Map<String, Value>),
    Sort(Vec<(String, SortDirection)>),
    Skip(u64),
    Limit(u64),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Lookup { .. } => "$lookup",
            Stage::Unwind { .. } => "$unwind",
            Stage::AddFields(_) => "$addFields",
            Stage::Project(_) => "$project",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
        }
    }

    pub fn to_document(&self) -> Value {
        let body = match self {
            Stage::Match(query) => query.clone(),
            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                alias,
            } => json!({
                "from": from,
                "localField": local_field,
                "foreignField": foreign_field,
                "as": alias,
            }),
            Stage::Unwind { path } => json!({
                "path": format!("${}", path),
                "preserveNullAndEmptyArrays": false,
            }),
            Stage::AddFields(fields) | Stage::Project(fields) => Value::Object(fields.clone()),
            Stage::Sort(keys) => Value::Object(
                keys.iter()
                    .map(|(field, direction)| (field.clone(), json!(direction.as_native())))
                    .collect(),
            ),
            Stage::Skip(n) | Stage::Limit(n) => json!(n),
        };
        json!({ self.name(): body })
    }
}

/// Document form of a whole pipeline
pub fn pipeline_document(stages: &[Stage]) -> Value {
    Value::Array(stages.iter().map(Stage::to_document).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_forms() {
        assert_eq!(Stage::Skip(5).to_document(), json!({ "$skip": 5 }));
        assert_eq!(
            Stage::Unwind { path: "_entity".into() }.to_document(),
            json!({ "$unwind": { "path": "$_entity", "preserveNullAndEmptyArrays": false } })
        );
        assert_eq!(
            Stage::Sort(vec![
                ("_name".into(), SortDirection::Asc),
                ("_createdDateTime".into(), SortDirection::Desc)
            ])
            .to_document(),
            json!({ "$sort": { "_name": 1, "_createdDateTime": -1 } })
        );
        assert_eq!(
            Stage::Lookup {
                from: "List".into(),
                local_field: "_listId".into(),
                foreign_field: "_id".into(),
                alias: "_list".into()
            }
            .to_document(),
            json!({ "$lookup": { "from": "List", "localField": "_listId", "foreignField": "_id", "as": "_list" } })
        );
    }
}
