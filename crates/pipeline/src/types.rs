//! Data model for the retrieval-and-decision pipeline.

use chrono::{DateTime, Utc};
use scout_store::{DocumentStore, RawDocument};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single user question, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// The raw question text
    pub text: String,

    /// Optional prior-turn context
    pub context: Option<String>,

    /// Optional user-supplied filters
    pub filters: Option<QueryFilters>,
}

impl Query {
    /// Create a query from raw question text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            filters: None,
        }
    }

    /// Attach prior-turn context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach user-supplied filters.
    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = Some(filters);
        self
    }
}

/// User-supplied constraints on a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Restrict the search to one store (overrides the judge)
    pub scope: Option<SourceScope>,

    /// Only documents modified after this timestamp
    pub updated_after: Option<DateTime<Utc>>,

    /// Tracker project key
    pub project: Option<String>,

    /// Wiki space key
    pub space: Option<String>,
}

/// Classification of what kind of answer the question wants.
///
/// Order matters: classification walks a fixed priority list and the first
/// matching category wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Troubleshooting,
    ChangeRequest,
    Procedure,
    DesignDetail,
    FeatureInquiry,
    General,
}

/// How the keywords were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Llm,
    RuleBased,
}

/// Output of keyword extraction.
///
/// Keywords are deduplicated and kept in relevance order (insertion order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub keywords: Vec<String>,
    pub question_type: QuestionType,
    /// Extraction confidence in [0,1]
    pub confidence: f64,
    pub method: ExtractionMethod,
}

/// Which store(s) a search run should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceScope {
    Tracker,
    Wiki,
    Both,
}

impl SourceScope {
    /// The concrete stores this scope covers.
    pub fn stores(&self) -> &'static [DocumentStore] {
        match self {
            Self::Tracker => &[DocumentStore::Tracker],
            Self::Wiki => &[DocumentStore::Wiki],
            Self::Both => &[DocumentStore::Tracker, DocumentStore::Wiki],
        }
    }
}

/// A store-specific filter suggestion attached to a source decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterHint {
    /// Narrow to documents modified within the last N days
    UpdatedWithinDays(i64),
    /// Narrow to documents modified after a point in time
    UpdatedAfter(DateTime<Utc>),
    /// Wiki only: restrict to pages (exclude attachments and comments)
    PagesOnly,
    /// Tracker only: restrict to a project key
    Project(String),
    /// Wiki only: restrict to a space key
    Space(String),
}

/// Output of the data-source judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDecision {
    /// Primary store scope. Invariant: confidence below the configured
    /// threshold forces `Both` — the judge defers rather than guesses.
    pub primary: SourceScope,

    /// Judgment confidence in [0,1]
    pub confidence: f64,

    /// Human-readable rationale
    pub rationale: String,

    /// Suggested store-specific filters
    pub filters: Vec<FilterHint>,
}

/// The three fixed query-construction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Keywords matched preferentially against document titles
    TitlePriority,
    /// Keywords AND-combined, falling back to OR when AND yields nothing
    SplitKeyword,
    /// The full keyword sequence matched as a contiguous phrase
    Phrase,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::TitlePriority,
        StrategyKind::SplitKeyword,
        StrategyKind::Phrase,
    ];

    /// Canonical name, used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TitlePriority => "title_priority",
            Self::SplitKeyword => "split_keyword",
            Self::Phrase => "phrase",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one strategy against one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyResult {
    pub strategy: StrategyKind,
    pub store: DocumentStore,
    /// Documents in store-returned rank order
    pub documents: Vec<RawDocument>,
    pub elapsed: Duration,
    /// The store was not called; the documents came from the cache
    pub from_cache: bool,
    /// The documents are a last-known-good substitution under a relaxed TTL
    pub from_stale: bool,
    /// The strategy raised and was degraded to an empty result
    pub failed: bool,
}

impl StrategyResult {
    /// An empty, failed result for a strategy that raised.
    pub fn failed(strategy: StrategyKind, store: DocumentStore, elapsed: Duration) -> Self {
        Self {
            strategy,
            store,
            documents: Vec::new(),
            elapsed,
            from_cache: false,
            from_stale: false,
            failed: true,
        }
    }
}

/// A deduplicated document annotated with its merged relevance weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: RawDocument,
    /// Sum of base weights of every strategy that found the document
    pub weight: f64,
    /// Best (lowest) store-returned rank across strategies
    pub best_rank: usize,
}

/// Deduplicated, rank-merged result list.
///
/// Order is fully deterministic for identical inputs: weight descending,
/// then best store rank ascending, then id, then store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedResult {
    pub documents: Vec<ScoredDocument>,
}

impl MergedResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Multi-axis quality assessment of a merged result list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityScore {
    /// Average keyword density across excerpts, in [0,1]
    pub relevance: f64,
    /// Fraction of documents with a non-empty excerpt and a link
    pub completeness: f64,
    /// Linear recency decay, in [0,1]
    pub freshness: f64,
    /// Fraction of keywords covered by at least one document
    pub coverage: f64,
    /// Weighted overall score, in [0,1]; exactly 0.0 for empty results
    pub overall: f64,
}

impl QualityScore {
    /// The all-zero score assigned to empty result sets.
    pub fn zero() -> Self {
        Self {
            relevance: 0.0,
            completeness: 0.0,
            freshness: 0.0,
            coverage: 0.0,
            overall: 0.0,
        }
    }
}

/// The two answer-generation paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPath {
    /// Synthesize directly from the merged results
    DirectSynthesis,
    /// Run one exploratory re-search round first
    FallbackResearch,
}

/// The quality-gated routing decision, created once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoverDecision {
    pub path: AnswerPath,
    /// The score that triggered the decision
    pub score: QualityScore,
    /// Monotonically increasing handover counter
    pub sequence: u64,
}

/// Final result of a pipeline run, returned to the in-process caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// The answer text
    pub answer: String,

    /// Routing decision, for observability
    pub decision: HandoverDecision,

    /// Quality score of the pre-research merged results
    pub score: QualityScore,

    /// The merged documents the answer was built from
    pub merged: MergedResult,

    /// The answer degraded to the deterministic template
    pub degraded: bool,
}

/// Accumulated per-path statistics across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub direct_count: u64,
    pub fallback_count: u64,
    /// Running average of overall scores
    pub average_score: f64,
}

impl RunStats {
    /// Fold one run into the statistics.
    pub fn record(&mut self, path: AnswerPath, overall: f64) {
        match path {
            AnswerPath::DirectSynthesis => self.direct_count += 1,
            AnswerPath::FallbackResearch => self.fallback_count += 1,
        }
        let total = (self.direct_count + self.fallback_count) as f64;
        self.average_score += (overall - self.average_score) / total;
    }

    pub fn total_runs(&self) -> u64 {
        self.direct_count + self.fallback_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let query = Query::new("how do sessions expire?")
            .with_context("we were discussing login")
            .with_filters(QueryFilters {
                scope: Some(SourceScope::Wiki),
                ..Default::default()
            });

        assert_eq!(query.text, "how do sessions expire?");
        assert!(query.context.is_some());
        assert_eq!(query.filters.unwrap().scope, Some(SourceScope::Wiki));
    }

    #[test]
    fn test_scope_expansion() {
        assert_eq!(SourceScope::Tracker.stores().len(), 1);
        assert_eq!(SourceScope::Both.stores().len(), 2);
    }

    #[test]
    fn test_run_stats_average() {
        let mut stats = RunStats::default();
        stats.record(AnswerPath::DirectSynthesis, 0.8);
        stats.record(AnswerPath::FallbackResearch, 0.4);

        assert_eq!(stats.direct_count, 1);
        assert_eq!(stats.fallback_count, 1);
        assert_eq!(stats.total_runs(), 2);
        assert!((stats.average_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_zero_score() {
        let score = QualityScore::zero();
        assert_eq!(score.overall, 0.0);
    }
}
