//! Multi-strategy search fan-out.
//!
//! Runs the three query-construction strategies against every store the
//! judge picked, concurrently (at most six calls in flight). Each strategy
//! consults the cache before touching a store; transient store errors get one
//! retry with backoff, and a store whose strategies all fail is substituted
//! with its last-known-good cached result set when one exists.

use crate::cache::CacheManager;
use crate::types::{
    ExtractionResult, FilterHint, SourceDecision, SourceScope, StrategyKind, StrategyResult,
};
use scout_core::{AppError, AppResult, PipelineConfig};
use scout_store::{DocumentStore, RawDocument, StoreClient};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Search fan-out engine.
pub struct SearchExecutor {
    tracker: Arc<dyn StoreClient>,
    wiki: Arc<dyn StoreClient>,
    cache: Arc<CacheManager>,
    config: PipelineConfig,
}

impl SearchExecutor {
    pub fn new(
        tracker: Arc<dyn StoreClient>,
        wiki: Arc<dyn StoreClient>,
        cache: Arc<CacheManager>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            tracker,
            wiki,
            cache,
            config,
        }
    }

    fn client(&self, store: DocumentStore) -> &Arc<dyn StoreClient> {
        match store {
            DocumentStore::Tracker => &self.tracker,
            DocumentStore::Wiki => &self.wiki,
        }
    }

    /// Run every strategy against every chosen store.
    ///
    /// Individual strategy failures degrade to empty failed results; the
    /// call itself never fails.
    pub async fn search(
        &self,
        decision: &SourceDecision,
        extraction: &ExtractionResult,
    ) -> Vec<StrategyResult> {
        let stores = decision.primary.stores();

        let calls = stores.iter().flat_map(|store| {
            StrategyKind::ALL
                .iter()
                .map(move |strategy| (*store, *strategy))
        });

        let mut results = futures::future::join_all(calls.map(|(store, strategy)| {
            self.run_strategy(store, strategy, extraction, &decision.filters)
        }))
        .await;

        for store in stores {
            self.record_fresh_results(*store, &results);
            self.substitute_stale_if_needed(*store, &mut results);
        }

        tracing::info!(
            strategies = results.len(),
            documents = results.iter().map(|r| r.documents.len()).sum::<usize>(),
            failed = results.iter().filter(|r| r.failed).count(),
            "Search fan-out completed"
        );

        results
    }

    /// One exploratory round of free-form queries, used by the fallback
    /// research path. Queries run concurrently under the same per-call
    /// timeout; failures degrade to empty results.
    pub async fn explore(&self, scope: SourceScope, queries: &[String]) -> Vec<StrategyResult> {
        let calls = scope.stores().iter().flat_map(|store| {
            queries
                .iter()
                .map(move |query| (*store, format!("text ~ \"{}\"", query)))
        });

        futures::future::join_all(calls.map(|(store, structured)| async move {
            let started = Instant::now();
            match self.query_with_retry(store, &structured).await {
                Ok(documents) => StrategyResult {
                    strategy: StrategyKind::SplitKeyword,
                    store,
                    documents,
                    elapsed: started.elapsed(),
                    from_cache: false,
                    from_stale: false,
                    failed: false,
                },
                Err(e) => {
                    tracing::warn!("Exploratory query against {} failed: {}", store, e);
                    StrategyResult::failed(StrategyKind::SplitKeyword, store, started.elapsed())
                }
            }
        }))
        .await
    }

    async fn run_strategy(
        &self,
        store: DocumentStore,
        strategy: StrategyKind,
        extraction: &ExtractionResult,
        filters: &[FilterHint],
    ) -> StrategyResult {
        let started = Instant::now();
        let key = CacheManager::search_key(store, strategy, &extraction.keywords, filters);

        if let Some(bytes) = self.cache.get(&key) {
            if let Ok(documents) = serde_json::from_slice::<Vec<RawDocument>>(&bytes) {
                tracing::debug!(%store, %strategy, "Cache hit, store not called");
                return StrategyResult {
                    strategy,
                    store,
                    documents,
                    elapsed: started.elapsed(),
                    from_cache: true,
                    from_stale: false,
                    failed: false,
                };
            }
        }

        let min_match = self.config.min_match_count;
        let structured = render_query(store, strategy, &extraction.keywords, filters, false, min_match);
        let outcome = match self.query_with_retry(store, &structured).await {
            Ok(documents)
                if documents.is_empty()
                    && strategy == StrategyKind::SplitKeyword
                    && extraction.keywords.len() > 1 =>
            {
                // AND found nothing; relax to OR
                let relaxed =
                    render_query(store, strategy, &extraction.keywords, filters, true, min_match);
                self.query_with_retry(store, &relaxed).await
            }
            other => other,
        };

        match outcome {
            Ok(documents) => {
                if let Ok(bytes) = serde_json::to_vec(&documents) {
                    self.cache
                        .set(key, bytes, Duration::from_secs(self.config.cache_ttl_secs));
                }
                StrategyResult {
                    strategy,
                    store,
                    documents,
                    elapsed: started.elapsed(),
                    from_cache: false,
                    from_stale: false,
                    failed: false,
                }
            }
            Err(e) => {
                tracing::warn!(%store, %strategy, "Strategy failed: {}", e);
                StrategyResult::failed(strategy, store, started.elapsed())
            }
        }
    }

    /// Issue one store query with a per-call timeout and a single retry on
    /// transient errors. Auth and malformed-query errors are not retried.
    async fn query_with_retry(
        &self,
        store: DocumentStore,
        structured: &str,
    ) -> AppResult<Vec<RawDocument>> {
        match self.query_once(store, structured).await {
            Err(e) if e.is_transient() => {
                tracing::debug!(%store, "Transient store error, retrying: {}", e);
                tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                self.query_once(store, structured).await
            }
            other => other,
        }
    }

    async fn query_once(
        &self,
        store: DocumentStore,
        structured: &str,
    ) -> AppResult<Vec<RawDocument>> {
        let timeout = Duration::from_millis(self.config.store_timeout_ms);
        let call = self
            .client(store)
            .query(structured, self.config.max_results_per_strategy);

        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| AppError::StoreNetwork(format!("{} query timed out", store)))?
    }

    /// Keep the union of this run's fresh documents per store for outage
    /// substitution on a later run.
    fn record_fresh_results(&self, store: DocumentStore, results: &[StrategyResult]) {
        let fresh: Vec<RawDocument> = results
            .iter()
            .filter(|r| r.store == store && !r.failed && !r.from_stale)
            .flat_map(|r| r.documents.iter().cloned())
            .collect();

        self.cache.record_last_known_good(
            store,
            &fresh,
            Duration::from_secs(self.config.stale_ttl_secs),
        );
    }

    fn substitute_stale_if_needed(&self, store: DocumentStore, results: &mut Vec<StrategyResult>) {
        let all_failed = results
            .iter()
            .filter(|r| r.store == store)
            .all(|r| r.failed);
        if !all_failed {
            return;
        }

        if let Some(documents) = self.cache.last_known_good(store) {
            tracing::warn!(%store, "All strategies failed, substituting last-known-good results");
            results.push(StrategyResult {
                strategy: StrategyKind::SplitKeyword,
                store,
                documents,
                elapsed: Duration::ZERO,
                from_cache: true,
                from_stale: true,
                failed: false,
            });
        }
    }
}

/// Render a structured query in the store's dialect.
///
/// The strict split-keyword form ANDs only the `min_match` most relevant
/// keywords (keyword order is relevance order); the relaxed form ORs them
/// all.
fn render_query(
    store: DocumentStore,
    strategy: StrategyKind,
    keywords: &[String],
    filters: &[FilterHint],
    relaxed: bool,
    min_match: usize,
) -> String {
    let core = match strategy {
        StrategyKind::TitlePriority => keywords
            .iter()
            .map(|k| format!("title ~ \"{}\"", k))
            .collect::<Vec<_>>()
            .join(" AND "),
        StrategyKind::SplitKeyword => {
            if relaxed {
                keywords
                    .iter()
                    .map(|k| format!("text ~ \"{}\"", k))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            } else {
                keywords
                    .iter()
                    .take(min_match.max(1))
                    .map(|k| format!("text ~ \"{}\"", k))
                    .collect::<Vec<_>>()
                    .join(" AND ")
            }
        }
        StrategyKind::Phrase => format!("text ~ \"{}\"", keywords.join(" ")),
    };

    let clauses: Vec<String> = filters
        .iter()
        .filter_map(|f| filter_clause(store, f))
        .collect();

    if clauses.is_empty() {
        core
    } else {
        format!("{} AND {}", core, clauses.join(" AND "))
    }
}

/// Translate a filter hint into a store-dialect clause. Hints that do not
/// apply to the store are skipped. Clause values are deliberately unquoted
/// so they never read as search terms.
fn filter_clause(store: DocumentStore, filter: &FilterHint) -> Option<String> {
    match (store, filter) {
        (DocumentStore::Tracker, FilterHint::UpdatedWithinDays(days)) => {
            Some(format!("updated >= -{}d", days))
        }
        (DocumentStore::Wiki, FilterHint::UpdatedWithinDays(days)) => {
            Some(format!("lastmodified >= now(-{}d)", days))
        }
        (DocumentStore::Tracker, FilterHint::UpdatedAfter(ts)) => {
            Some(format!("updated >= {}", ts.format("%Y-%m-%d")))
        }
        (DocumentStore::Wiki, FilterHint::UpdatedAfter(ts)) => {
            Some(format!("lastmodified >= {}", ts.format("%Y-%m-%d")))
        }
        (DocumentStore::Wiki, FilterHint::PagesOnly) => Some("type = page".to_string()),
        (DocumentStore::Tracker, FilterHint::PagesOnly) => None,
        (DocumentStore::Tracker, FilterHint::Project(key)) => Some(format!("project = {}", key)),
        (DocumentStore::Wiki, FilterHint::Project(_)) => None,
        (DocumentStore::Wiki, FilterHint::Space(key)) => Some(format!("space = {}", key)),
        (DocumentStore::Tracker, FilterHint::Space(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtractionMethod, QuestionType};
    use scout_store::MemoryStore;

    fn extraction(keywords: &[&str]) -> ExtractionResult {
        ExtractionResult {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            question_type: QuestionType::General,
            confidence: 0.9,
            method: ExtractionMethod::Llm,
        }
    }

    fn decision(primary: SourceScope) -> SourceDecision {
        SourceDecision {
            primary,
            confidence: 0.9,
            rationale: String::new(),
            filters: Vec::new(),
        }
    }

    fn executor(
        tracker: MemoryStore,
        wiki: MemoryStore,
    ) -> (SearchExecutor, Arc<CacheManager>) {
        let cache = Arc::new(CacheManager::new());
        let executor = SearchExecutor::new(
            Arc::new(tracker),
            Arc::new(wiki),
            Arc::clone(&cache),
            PipelineConfig::default(),
        );
        (executor, cache)
    }

    fn wiki_with_login_page() -> MemoryStore {
        MemoryStore::serving(
            DocumentStore::Wiki,
            vec![MemoryStore::document(
                DocumentStore::Wiki,
                "p1",
                "Login specification",
                "session rules",
                5,
            )],
        )
    }

    #[tokio::test]
    async fn test_three_strategies_per_store() {
        let (executor, _) = executor(
            MemoryStore::empty(DocumentStore::Tracker),
            wiki_with_login_page(),
        );

        let results = executor
            .search(&decision(SourceScope::Both), &extraction(&["login"]))
            .await;
        assert_eq!(results.len(), 6);

        let wiki_only = executor
            .search(&decision(SourceScope::Wiki), &extraction(&["login"]))
            .await;
        assert_eq!(wiki_only.len(), 3);
        assert!(wiki_only.iter().all(|r| r.store == DocumentStore::Wiki));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store_call() {
        let wiki = Arc::new(wiki_with_login_page());
        let cache = Arc::new(CacheManager::new());
        let executor = SearchExecutor::new(
            Arc::new(MemoryStore::empty(DocumentStore::Tracker)),
            Arc::clone(&wiki) as Arc<dyn StoreClient>,
            Arc::clone(&cache),
            PipelineConfig::default(),
        );

        let extraction = extraction(&["login"]);
        executor
            .search(&decision(SourceScope::Wiki), &extraction)
            .await;
        let first_round = wiki.call_count();
        assert!(first_round > 0);

        let results = executor
            .search(&decision(SourceScope::Wiki), &extraction)
            .await;
        assert_eq!(wiki.call_count(), first_round);
        assert!(results.iter().all(|r| r.from_cache));
    }

    #[tokio::test]
    async fn test_failed_store_degrades_without_error() {
        let (executor, _) = executor(
            MemoryStore::failing(DocumentStore::Tracker),
            wiki_with_login_page(),
        );

        let results = executor
            .search(&decision(SourceScope::Both), &extraction(&["login"]))
            .await;

        let tracker_failed = results
            .iter()
            .filter(|r| r.store == DocumentStore::Tracker && r.failed)
            .count();
        assert_eq!(tracker_failed, 3);

        let wiki_documents: usize = results
            .iter()
            .filter(|r| r.store == DocumentStore::Wiki)
            .map(|r| r.documents.len())
            .sum();
        assert!(wiki_documents > 0);
    }

    #[tokio::test]
    async fn test_transient_failure_gets_one_retry() {
        let wiki = Arc::new(MemoryStore::recovering(
            DocumentStore::Wiki,
            vec![MemoryStore::document(
                DocumentStore::Wiki,
                "p1",
                "Login specification",
                "session rules",
                5,
            )],
        ));
        let config = PipelineConfig {
            retry_backoff_ms: 1,
            ..PipelineConfig::default()
        };
        let executor = SearchExecutor::new(
            Arc::new(MemoryStore::empty(DocumentStore::Tracker)),
            Arc::clone(&wiki) as Arc<dyn StoreClient>,
            Arc::new(CacheManager::new()),
            config,
        );

        let results = executor
            .search(&decision(SourceScope::Wiki), &extraction(&["login"]))
            .await;

        assert!(results.iter().all(|r| !r.failed));
        // three strategy calls plus one retry of the dropped first call
        assert_eq!(wiki.call_count(), 4);
    }

    #[tokio::test]
    async fn test_rejected_query_is_not_retried() {
        let wiki = Arc::new(MemoryStore::rejecting(DocumentStore::Wiki));
        let executor = SearchExecutor::new(
            Arc::new(MemoryStore::empty(DocumentStore::Tracker)),
            Arc::clone(&wiki) as Arc<dyn StoreClient>,
            Arc::new(CacheManager::new()),
            PipelineConfig::default(),
        );

        let results = executor
            .search(&decision(SourceScope::Wiki), &extraction(&["login"]))
            .await;

        assert!(results
            .iter()
            .filter(|r| r.store == DocumentStore::Wiki)
            .all(|r| r.failed));
        // a malformed query never gets a second attempt
        assert_eq!(wiki.call_count(), 3);
    }

    #[tokio::test]
    async fn test_stale_substitution_after_outage() {
        let cache = Arc::new(CacheManager::new());
        let config = PipelineConfig::default();

        // First run against a healthy store seeds last-known-good
        let healthy = SearchExecutor::new(
            Arc::new(MemoryStore::empty(DocumentStore::Tracker)),
            Arc::new(wiki_with_login_page()),
            Arc::clone(&cache),
            config.clone(),
        );
        healthy
            .search(&decision(SourceScope::Wiki), &extraction(&["login"]))
            .await;

        // Second run: store down, cache cleared of fresh entries
        cache.clear(Some("search:"));
        let broken = SearchExecutor::new(
            Arc::new(MemoryStore::empty(DocumentStore::Tracker)),
            Arc::new(MemoryStore::failing(DocumentStore::Wiki)),
            Arc::clone(&cache),
            config,
        );
        let results = broken
            .search(&decision(SourceScope::Wiki), &extraction(&["login"]))
            .await;

        let stale: Vec<_> = results.iter().filter(|r| r.from_stale).collect();
        assert_eq!(stale.len(), 1);
        assert!(!stale[0].documents.is_empty());
    }

    #[tokio::test]
    async fn test_split_keyword_relaxes_to_or() {
        // "login AND invoices" matches nothing; OR matches both pages
        let wiki = MemoryStore::serving(
            DocumentStore::Wiki,
            vec![
                MemoryStore::document(DocumentStore::Wiki, "p1", "Login page", "sessions", 5),
                MemoryStore::document(DocumentStore::Wiki, "p2", "Invoices", "billing", 5),
            ],
        );
        let (executor, _) = executor(MemoryStore::empty(DocumentStore::Tracker), wiki);

        let results = executor
            .search(
                &decision(SourceScope::Wiki),
                &extraction(&["login", "invoices"]),
            )
            .await;

        let split = results
            .iter()
            .find(|r| r.strategy == StrategyKind::SplitKeyword)
            .unwrap();
        assert_eq!(split.documents.len(), 2);
    }

    #[test]
    fn test_query_rendering_dialects() {
        let keywords = vec!["login".to_string(), "session".to_string()];

        let title = render_query(
            DocumentStore::Wiki,
            StrategyKind::TitlePriority,
            &keywords,
            &[],
            false,
            2,
        );
        assert_eq!(title, "title ~ \"login\" AND title ~ \"session\"");

        let phrase = render_query(
            DocumentStore::Tracker,
            StrategyKind::Phrase,
            &keywords,
            &[],
            false,
            2,
        );
        assert_eq!(phrase, "text ~ \"login session\"");

        let filtered = render_query(
            DocumentStore::Tracker,
            StrategyKind::SplitKeyword,
            &keywords,
            &[
                FilterHint::UpdatedWithinDays(90),
                FilterHint::PagesOnly,
                FilterHint::Project("OPS".to_string()),
            ],
            false,
            2,
        );
        assert_eq!(
            filtered,
            "text ~ \"login\" AND text ~ \"session\" AND updated >= -90d AND project = OPS"
        );
    }

    #[test]
    fn test_split_keyword_strict_form_caps_and_terms() {
        let keywords = vec![
            "login".to_string(),
            "session".to_string(),
            "timeout".to_string(),
        ];
        let strict = render_query(
            DocumentStore::Wiki,
            StrategyKind::SplitKeyword,
            &keywords,
            &[],
            false,
            2,
        );
        assert_eq!(strict, "text ~ \"login\" AND text ~ \"session\"");

        let relaxed = render_query(
            DocumentStore::Wiki,
            StrategyKind::SplitKeyword,
            &keywords,
            &[],
            true,
            2,
        );
        assert_eq!(
            relaxed,
            "text ~ \"login\" OR text ~ \"session\" OR text ~ \"timeout\""
        );
    }
}
