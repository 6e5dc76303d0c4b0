//! TTL cache shared across pipeline runs.
//!
//! Backed by a sharded concurrent map, so parallel strategies can read and
//! write without a global lock; per-key upsert is atomic and last-writer-wins
//! (cached values are idempotent re-derivations of the same store query).
//! Expired entries are deleted lazily by the read that discovers them.

use dashmap::DashMap;
use scout_store::{DocumentStore, RawDocument};
use std::time::{Duration, Instant};

use crate::types::{FilterHint, StrategyKind};

/// A cached value with its expiry.
struct CacheEntry {
    value: Vec<u8>,
    #[allow(dead_code)]
    created_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local key/value cache with TTL.
pub struct CacheManager {
    entries: DashMap<String, CacheEntry>,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Look up a key. Misses on absent or expired entries; an expired entry
    /// is deleted by the read that discovers it.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) if entry.expired(now) => true,
            Some(entry) => return Some(entry.value.clone()),
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Insert or overwrite a key. `ttl` of zero makes the entry immediately
    /// invisible to readers.
    pub fn set(&self, key: impl Into<String>, value: Vec<u8>, ttl: Duration) {
        let now = Instant::now();
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Remove entries. Without a pattern, everything goes; with one, only
    /// keys containing the pattern substring.
    pub fn clear(&self, pattern: Option<&str>) {
        match pattern {
            None => self.entries.clear(),
            Some(pattern) => self.entries.retain(|key, _| !key.contains(pattern)),
        }
    }

    /// Number of entries, including not-yet-collected expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deterministic cache key for a strategy call.
    ///
    /// Keywords are normalized (lowercased, sorted) so that runs extracting
    /// the same set in a different order share an entry.
    pub fn search_key(
        store: DocumentStore,
        strategy: StrategyKind,
        keywords: &[String],
        filters: &[FilterHint],
    ) -> String {
        let mut normalized: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        normalized.sort();
        normalized.dedup();

        let filter_part = filters
            .iter()
            .map(|f| format!("{:?}", f).to_lowercase())
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "search:{}:{}:{}:{}",
            store.as_str(),
            strategy.as_str(),
            normalized.join("+"),
            filter_part
        )
    }

    /// Key for the memoized keyword extraction of a question.
    pub fn extraction_key(question: &str) -> String {
        format!(
            "extract:{}",
            question.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
        )
    }

    fn last_known_good_key(store: DocumentStore) -> String {
        format!("lkg:{}", store.as_str())
    }

    /// Record the latest successful result set for a store, kept under the
    /// relaxed TTL for outage substitution.
    pub fn record_last_known_good(
        &self,
        store: DocumentStore,
        documents: &[RawDocument],
        stale_ttl: Duration,
    ) {
        if documents.is_empty() {
            return;
        }
        if let Ok(bytes) = serde_json::to_vec(documents) {
            self.set(Self::last_known_good_key(store), bytes, stale_ttl);
        }
    }

    /// Fetch the last-known-good result set for a store, if still within the
    /// relaxed TTL.
    pub fn last_known_good(&self, store: DocumentStore) -> Option<Vec<RawDocument>> {
        let bytes = self.get(&Self::last_known_good_key(store))?;
        serde_json::from_slice(&bytes).ok()
    }
}
