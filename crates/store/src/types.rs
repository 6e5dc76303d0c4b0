//! Store identifiers and the normalized document model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two document stores the pipeline can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStore {
    /// Ticket tracker: defects, tasks, status
    Tracker,
    /// Wiki: specifications, procedures, design documents
    Wiki,
}

impl DocumentStore {
    /// Canonical lowercase name, used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tracker => "tracker",
            Self::Wiki => "wiki",
        }
    }
}

impl std::fmt::Display for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single document as returned by a store, normalized across stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Store-scoped unique id (ticket key or page id)
    pub id: String,

    /// Document title
    pub title: String,

    /// Store of origin
    pub store: DocumentStore,

    /// Last-modified timestamp
    pub updated: DateTime<Utc>,

    /// Content excerpt (may be empty when the store returns none)
    pub excerpt: String,

    /// Link to the document
    pub url: String,
}

impl RawDocument {
    /// Dedup key: a document is the same document iff store and id match.
    pub fn dedup_key(&self) -> (DocumentStore, &str) {
        (self.store, &self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_names() {
        assert_eq!(DocumentStore::Tracker.as_str(), "tracker");
        assert_eq!(DocumentStore::Wiki.to_string(), "wiki");
    }

    #[test]
    fn test_dedup_key_distinguishes_stores() {
        let make = |store| RawDocument {
            id: "42".to_string(),
            title: "same id".to_string(),
            store,
            updated: Utc::now(),
            excerpt: String::new(),
            url: String::new(),
        };
        let a = make(DocumentStore::Tracker);
        let b = make(DocumentStore::Wiki);
        assert_ne!(a.dedup_key(), b.dedup_key());
    }
}
