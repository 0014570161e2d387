//! Count collaborator port used by the Limit Engine

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::domain::filter::FilterExpr;
use crate::domain::record::RecordFamily;
use crate::error::Result;
use crate::features::native::{DocumentStore, NativeTranslator};

/// Counts the records of a family matching an expression
#[async_trait]
pub trait RecordCounter: Send + Sync {
    async fn count(&self, family: RecordFamily, expr: &FilterExpr) -> Result<u64>;
}

/// `RecordCounter` over a `DocumentStore`: translate, then count in the
/// family's configured collection
pub struct StoreCounter<S> {
    store: Arc<S>,
    config: Arc<EngineConfig>,
    translator: NativeTranslator,
}

impl<S: DocumentStore> StoreCounter<S> {
    pub fn new(store: Arc<S>, config: Arc<EngineConfig>) -> Self {
        let translator = config.translator();
        Self {
            store,
            config,
            translator,
        }
    }
}

#[async_trait]
impl<S: DocumentStore> RecordCounter for StoreCounter<S> {
    async fn count(&self, family: RecordFamily, expr: &FilterExpr) -> Result<u64> {
        let query = self.translator.translate(expr);
        let collection = &self.config.family(family).collection;
        self.store.count(collection, &query).await
    }
}
