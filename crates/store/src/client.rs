//! The store collaborator trait.

use crate::types::RawDocument;
use scout_core::AppResult;

/// Trait for document-store clients.
///
/// One instance serves one store. Failures surface as
/// `AppError::StoreAuth`, `AppError::StoreQuery` (malformed structured
/// query), or `AppError::StoreNetwork`; the search executor decides which of
/// those are retryable.
#[async_trait::async_trait]
pub trait StoreClient: Send + Sync {
    /// Execute a structured query and return up to `max_results` documents,
    /// in store-returned rank order.
    async fn query(&self, structured_query: &str, max_results: usize)
        -> AppResult<Vec<RawDocument>>;
}
