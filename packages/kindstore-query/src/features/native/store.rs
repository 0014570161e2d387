//! Storage collaborator contract consumed by the engine

use async_trait::async_trait;
use serde_json::Value;

use super::stage::Stage;
use crate::error::Result;

/// Query/count/aggregate side of a document store
///
/// Implementations own cancellation and timeouts; the engine propagates
/// their errors unchanged.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Number of documents in `collection` matching a query document
    async fn count(&self, collection: &str, query: &Value) -> Result<u64>;

    /// Run a staged pipeline against `collection`
    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> Result<Vec<Value>>;
}
