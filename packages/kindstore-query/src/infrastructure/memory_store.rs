//! In-memory document store
//!
//! HashMap-backed `DocumentStore` for tests, the explain tool and embedding
//! without a database. Records are date-coerced on insert, so query
//! documents produced by the translator compare against native instants the
//! same way a real store would.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::native_eval::{matches_document, run_stages};
use crate::domain::value::DateFields;
use crate::error::Result;
use crate::features::native::{DocumentStore, Stage};

#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Vec<Value>>>>,
    date_fields: DateFields,
}

impl InMemoryDocumentStore {
    pub fn new(date_fields: DateFields) -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            date_fields,
        }
    }

    pub fn insert(&self, collection: &str, record: Value) {
        let coerced = self.date_fields.coerce_record(&record);
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(coerced);
    }

    pub fn insert_many(&self, collection: &str, records: impl IntoIterator<Item = Value>) {
        let coerced: Vec<Value> = records
            .into_iter()
            .map(|r| self.date_fields.coerce_record(&r))
            .collect();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .extend(coerced);
    }

    /// Stored documents of a collection, in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.collections.write().clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn count(&self, collection: &str, query: &Value) -> Result<u64> {
        let collections = self.collections.read();
        let docs = collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        let mut count = 0u64;
        for doc in docs {
            if matches_document(query, doc)? {
                count += 1;
            }
        }
        debug!(collection, count, "Counted documents");
        Ok(count)
    }

    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> Result<Vec<Value>> {
        let collections = self.collections.read();
        let input = collections.get(collection).cloned().unwrap_or_default();
        let output = run_stages(stages, input, &collections)?;
        debug!(collection, stages = stages.len(), rows = output.len(), "Ran pipeline");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::FilterExpr;
    use crate::features::native::NativeTranslator;
    use serde_json::json;

    #[tokio::test]
    async fn test_count_with_translated_dates() {
        let store = InMemoryDocumentStore::new(DateFields::default());
        store.insert_many(
            "GenericEntity",
            vec![
                json!({ "_id": "a", "_createdDateTime": "2024-01-10T00:00:00Z" }),
                json!({ "_id": "b", "_createdDateTime": "2024-02-10T00:00:00Z" }),
            ],
        );

        let expr = FilterExpr::gte("_createdDateTime", "2024-02-01T00:00:00Z");
        let query = NativeTranslator::default().translate(&expr);
        assert_eq!(store.count("GenericEntity", &query).await.unwrap(), 1);
        assert_eq!(store.count("Unknown", &query).await.unwrap(), 0);
    }

    #[test]
    fn test_documents_are_stored_with_native_dates() {
        let store = InMemoryDocumentStore::new(DateFields::default());
        store.insert("GenericEntity", json!({ "_id": "a", "_createdDateTime": "2024-01-10T02:00:00+02:00" }));

        let docs = store.documents("GenericEntity");
        assert_eq!(
            docs,
            vec![json!({ "_id": "a", "_createdDateTime": { "$date": "2024-01-10T00:00:00.000Z" } })]
        );
        assert!(store.documents("List").is_empty());

        store.clear();
        assert_eq!(store.len("GenericEntity"), 0);
    }

    #[tokio::test]
    async fn test_aggregate_skip_limit() {
        let store = InMemoryDocumentStore::default();
        store.insert_many("List", (0..5).map(|i| json!({ "_id": i })));

        let rows = store
            .aggregate("List", &[Stage::Skip(1), Stage::Limit(2)])
            .await
            .unwrap();
        assert_eq!(rows, vec![json!({ "_id": 1 }), json!({ "_id": 2 })]);
        assert_eq!(store.len("List"), 5);
    }

    #[tokio::test]
    async fn test_malformed_query_propagates() {
        let store = InMemoryDocumentStore::default();
        store.insert("List", json!({ "_id": 1 }));
        let err = store
            .count("List", &json!({ "_id": { "$bogus": 1 } }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_filter");
    }
}
