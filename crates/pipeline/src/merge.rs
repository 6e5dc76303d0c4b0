//! Deduplication and rank-merge of per-strategy result lists.
//!
//! Pure functions over collected results. The output order is fully
//! deterministic for identical inputs: summed strategy weight descending,
//! then best store-returned rank ascending, then document id, then store.

use crate::types::{MergedResult, ScoredDocument, StrategyKind, StrategyResult};
use scout_core::StrategyWeights;
use scout_store::{DocumentStore, RawDocument};
use std::collections::BTreeSet;
use std::collections::HashMap;

/// Rank-merge engine carrying the per-strategy base weights.
pub struct ResultMerger {
    weights: StrategyWeights,
}

impl ResultMerger {
    pub fn new(weights: StrategyWeights) -> Self {
        Self { weights }
    }

    fn base_weight(&self, strategy: StrategyKind) -> f64 {
        match strategy {
            StrategyKind::TitlePriority => self.weights.title_priority,
            StrategyKind::Phrase => self.weights.phrase,
            StrategyKind::SplitKeyword => self.weights.split_keyword,
        }
    }

    /// Merge strategy outputs into one deduplicated ordered list.
    ///
    /// A document found by several strategies gets the sum of their base
    /// weights; a strategy counts at most once per document.
    pub fn merge(&self, results: &[StrategyResult]) -> MergedResult {
        struct Accum {
            document: RawDocument,
            strategies: BTreeSet<StrategyKind>,
            best_rank: usize,
        }

        let mut by_key: HashMap<(DocumentStore, String), Accum> = HashMap::new();

        for result in results.iter().filter(|r| !r.failed) {
            for (rank, document) in result.documents.iter().enumerate() {
                let key = (document.store, document.id.clone());
                match by_key.get_mut(&key) {
                    Some(accum) => {
                        accum.strategies.insert(result.strategy);
                        accum.best_rank = accum.best_rank.min(rank);
                    }
                    None => {
                        let mut strategies = BTreeSet::new();
                        strategies.insert(result.strategy);
                        by_key.insert(
                            key,
                            Accum {
                                document: document.clone(),
                                strategies,
                                best_rank: rank,
                            },
                        );
                    }
                }
            }
        }

        let documents = by_key
            .into_values()
            .map(|accum| ScoredDocument {
                weight: accum
                    .strategies
                    .iter()
                    .map(|s| self.base_weight(*s))
                    .sum(),
                document: accum.document,
                best_rank: accum.best_rank,
            })
            .collect();

        sorted(documents)
    }

    /// Union of two merged lists, used by the fallback research path.
    ///
    /// A document present in both keeps its higher weight and better rank,
    /// which makes the union idempotent: `union(m, m) == m`.
    pub fn union(&self, a: &MergedResult, b: &MergedResult) -> MergedResult {
        let mut by_key: HashMap<(DocumentStore, String), ScoredDocument> = HashMap::new();

        for scored in a.documents.iter().chain(b.documents.iter()) {
            let key = (scored.document.store, scored.document.id.clone());
            match by_key.get_mut(&key) {
                Some(existing) => {
                    existing.weight = existing.weight.max(scored.weight);
                    existing.best_rank = existing.best_rank.min(scored.best_rank);
                }
                None => {
                    by_key.insert(key, scored.clone());
                }
            }
        }

        sorted(by_key.into_values().collect())
    }
}

fn sorted(mut documents: Vec<ScoredDocument>) -> MergedResult {
    documents.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.best_rank.cmp(&b.best_rank))
            .then(a.document.id.cmp(&b.document.id))
            .then(a.document.store.as_str().cmp(b.document.store.as_str()))
    });
    MergedResult { documents }
}
