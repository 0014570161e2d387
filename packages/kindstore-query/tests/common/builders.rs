//! Builders for engine instances backed by the in-memory store

#![allow(dead_code)]

use kindstore_query::{
    EngineConfig, InMemoryDocumentStore, LimitEngine, RecordFamily, StoreCounter,
};
use serde_json::Value;
use std::sync::Arc;

use super::fixtures::{fixed_now, relation_corpus};

/// Store seeded with the relation corpus under the default collection names
pub fn relation_store(config: &EngineConfig) -> InMemoryDocumentStore {
    let store = InMemoryDocumentStore::new(config.date_fields().clone());
    let (lists, entities, relations) = relation_corpus();
    store.insert_many(&config.family(RecordFamily::List).collection, lists);
    store.insert_many(&config.family(RecordFamily::Entity).collection, entities);
    store.insert_many(&config.family(RecordFamily::Relation).collection, relations);
    store
}

/// Limit Engine counting against `store`, clock pinned to `fixed_now`
pub fn limit_engine(config: EngineConfig, store: Arc<InMemoryDocumentStore>) -> LimitEngine {
    let config = Arc::new(config);
    let counter = Arc::new(StoreCounter::new(store, config.clone()));
    LimitEngine::new(config, counter).with_clock(fixed_now)
}

/// Store with `records` in the family's collection
pub fn seeded_store(
    config: &EngineConfig,
    family: RecordFamily,
    records: impl IntoIterator<Item = Value>,
) -> Arc<InMemoryDocumentStore> {
    let store = InMemoryDocumentStore::new(config.date_fields().clone());
    store.insert_many(&config.family(family).collection, records);
    Arc::new(store)
}
