//! In-memory store for tests.
//!
//! Approximates a real store's behaviour over a fixed document set: quoted
//! terms are pulled out of the structured query, `AND` requires all of them,
//! `OR` any, and `title ~` restricts matching to titles. Failures can be
//! scripted instead of documents (always, or only on the first call) to
//! exercise degradation and retry paths, an artificial delay can be added to
//! exercise deadline paths, and every query bumps a call counter so tests can
//! assert a store was (not) called.

use crate::client::StoreClient;
use crate::types::{DocumentStore, RawDocument};
use chrono::Utc;
use scout_core::{AppError, AppResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the store does when queried.
enum Behaviour {
    Serve(Vec<RawDocument>),
    Fail(fn(String) -> AppError, String),
    /// First call drops with a network error, later calls serve
    RecoverAfterDrop(Vec<RawDocument>),
}

/// In-memory document store.
pub struct MemoryStore {
    store: DocumentStore,
    behaviour: Behaviour,
    delay: Duration,
    calls: AtomicUsize,
}

impl MemoryStore {
    fn with_behaviour(store: DocumentStore, behaviour: Behaviour) -> Self {
        Self {
            store,
            behaviour,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a store serving the given documents.
    pub fn serving(store: DocumentStore, documents: Vec<RawDocument>) -> Self {
        Self::with_behaviour(store, Behaviour::Serve(documents))
    }

    /// Create an empty store.
    pub fn empty(store: DocumentStore) -> Self {
        Self::serving(store, Vec::new())
    }

    /// Create a store that fails every query with a network error.
    pub fn failing(store: DocumentStore) -> Self {
        Self::with_behaviour(
            store,
            Behaviour::Fail(AppError::StoreNetwork, "scripted outage".to_string()),
        )
    }

    /// Create a store that rejects every query as malformed.
    pub fn rejecting(store: DocumentStore) -> Self {
        Self::with_behaviour(
            store,
            Behaviour::Fail(AppError::StoreQuery, "scripted rejection".to_string()),
        )
    }

    /// Create a store whose first query drops with a network error and whose
    /// later queries serve the given documents.
    pub fn recovering(store: DocumentStore, documents: Vec<RawDocument>) -> Self {
        Self::with_behaviour(store, Behaviour::RecoverAfterDrop(documents))
    }

    /// Create a store that sleeps for `delay` before serving each query.
    pub fn slow(store: DocumentStore, documents: Vec<RawDocument>, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::serving(store, documents)
        }
    }

    /// Number of queries issued against this store.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Convenience constructor for a test document.
    pub fn document(
        store: DocumentStore,
        id: &str,
        title: &str,
        excerpt: &str,
        age_days: i64,
    ) -> RawDocument {
        RawDocument {
            id: id.to_string(),
            title: title.to_string(),
            store,
            updated: Utc::now() - chrono::Duration::days(age_days),
            excerpt: excerpt.to_string(),
            url: format!("https://example.test/{}/{}", store.as_str(), id),
        }
    }

    /// Pull the quoted terms out of a structured query.
    fn terms(structured_query: &str) -> Vec<String> {
        let mut terms = Vec::new();
        let mut rest = structured_query;
        while let Some(start) = rest.find('"') {
            let after = &rest[start + 1..];
            match after.find('"') {
                Some(end) => {
                    terms.push(after[..end].to_lowercase());
                    rest = &after[end + 1..];
                }
                None => break,
            }
        }
        terms
    }

    fn matches(document: &RawDocument, structured_query: &str) -> bool {
        let terms = Self::terms(structured_query);
        if terms.is_empty() {
            return false;
        }

        let title = document.title.to_lowercase();
        let haystack = if structured_query.contains("title ~") {
            title.clone()
        } else {
            format!("{} {}", title, document.excerpt.to_lowercase())
        };

        let conjunctive = structured_query.contains(" AND ");
        if conjunctive {
            terms.iter().all(|t| haystack.contains(t.as_str()))
        } else {
            terms.iter().any(|t| haystack.contains(t.as_str()))
        }
    }

    fn serve(
        documents: &[RawDocument],
        structured_query: &str,
        max_results: usize,
    ) -> Vec<RawDocument> {
        documents
            .iter()
            .filter(|d| Self::matches(d, structured_query))
            .take(max_results)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl StoreClient for MemoryStore {
    async fn query(
        &self,
        structured_query: &str,
        max_results: usize,
    ) -> AppResult<Vec<RawDocument>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behaviour {
            Behaviour::Fail(build, msg) => Err(build(format!("{}: {}", self.store, msg))),
            Behaviour::Serve(documents) => Ok(Self::serve(documents, structured_query, max_results)),
            Behaviour::RecoverAfterDrop(documents) => {
                if call == 0 {
                    Err(AppError::StoreNetwork(format!(
                        "{}: scripted first-call drop",
                        self.store
                    )))
                } else {
                    Ok(Self::serve(documents, structured_query, max_results))
                }
            }
        }
    }
}
