//! HTTP-backed store client.
//!
//! One search endpoint per store: `GET {base_url}/search?q=...&limit=...`
//! returning a JSON array of results. This is intentionally the whole wire
//! surface; auth schemes, pagination and rate limiting belong to the
//! deployment in front of the store, not to this client.

use crate::client::StoreClient;
use crate::types::{DocumentStore, RawDocument};
use chrono::{DateTime, Utc};
use scout_core::{AppError, AppResult};
use serde::Deserialize;

/// One result row as the store endpoint returns it.
#[derive(Debug, Deserialize)]
struct WireDocument {
    id: String,
    title: String,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    url: String,
    updated: Option<DateTime<Utc>>,
}

/// REST client for a single document store.
pub struct RestStoreClient {
    store: DocumentStore,
    base_url: String,
    client: reqwest::Client,
}

impl RestStoreClient {
    /// Create a client for `store` rooted at `base_url`.
    pub fn new(store: DocumentStore, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn classify_status(&self, status: reqwest::StatusCode, body: String) -> AppError {
        match status.as_u16() {
            401 | 403 => AppError::StoreAuth(format!("{}: {}", self.store, body)),
            400 | 422 => AppError::StoreQuery(format!("{}: {}", self.store, body)),
            _ => AppError::StoreNetwork(format!("{}: HTTP {}: {}", self.store, status, body)),
        }
    }
}

#[async_trait::async_trait]
impl StoreClient for RestStoreClient {
    async fn query(
        &self,
        structured_query: &str,
        max_results: usize,
    ) -> AppResult<Vec<RawDocument>> {
        let url = format!("{}/search", self.base_url);

        tracing::debug!(store = %self.store, query = structured_query, "Store query");

        let response = self
            .client
            .get(&url)
            .query(&[("q", structured_query), ("limit", &max_results.to_string())])
            .send()
            .await
            .map_err(|e| AppError::StoreNetwork(format!("{}: {}", self.store, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(self.classify_status(status, body));
        }

        let wire: Vec<WireDocument> = response
            .json()
            .await
            .map_err(|e| AppError::StoreNetwork(format!("{}: malformed body: {}", self.store, e)))?;

        let documents = wire
            .into_iter()
            .take(max_results)
            .map(|d| RawDocument {
                id: d.id,
                title: d.title,
                store: self.store,
                updated: d.updated.unwrap_or_else(Utc::now),
                excerpt: d.excerpt,
                url: d.url,
            })
            .collect();

        Ok(documents)
    }
}
