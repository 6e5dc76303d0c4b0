//! Scout Pipeline Library
//!
//! The retrieval-and-decision core: keyword extraction, data-source
//! judgment, multi-strategy search fan-out, rank-merge, quality scoring,
//! and quality-gated answer generation. Invoked in-process with a [`Query`]
//! and returns a [`PipelineOutcome`]; no network surface of its own.

pub mod agents;
pub mod cache;
pub mod events;
pub mod extract;
pub mod judge;
pub mod merge;
pub mod quality;
pub mod search;
pub mod types;

pub use agents::{AgentSelector, ResearchAgent, SynthesisAgent};
pub use cache::CacheManager;
pub use events::{StageEmitter, StageEvent};
pub use extract::KeywordExtractor;
pub use judge::DataSourceJudge;
pub use merge::ResultMerger;
pub use quality::QualityEvaluator;
pub use search::SearchExecutor;
pub use types::{
    AnswerPath, ExtractionMethod, ExtractionResult, FilterHint, HandoverDecision, MergedResult,
    PipelineOutcome, QualityScore, Query, QueryFilters, QuestionType, RunStats, ScoredDocument,
    SourceDecision, SourceScope, StrategyKind, StrategyResult,
};

use scout_core::{AppResult, PipelineConfig};
use scout_llm::LlmClient;
use scout_store::StoreClient;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Best-effort state captured as stages complete, consulted when the run
/// exceeds its wall-clock budget.
#[derive(Default)]
struct Snapshot {
    merged: MergedResult,
    score: Option<QualityScore>,
    decision: Option<HandoverDecision>,
}

/// The assembled pipeline. One instance serves many runs; the cache and the
/// run statistics are shared across them.
pub struct Pipeline {
    extractor: KeywordExtractor,
    judge: DataSourceJudge,
    executor: SearchExecutor,
    merger: ResultMerger,
    evaluator: QualityEvaluator,
    selector: AgentSelector,
    research: ResearchAgent,
    synthesis: SynthesisAgent,
    emitter: StageEmitter,
    cache: Arc<CacheManager>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        tracker: Arc<dyn StoreClient>,
        wiki: Arc<dyn StoreClient>,
        config: PipelineConfig,
    ) -> Self {
        Self::with_cache(llm, model, tracker, wiki, Arc::new(CacheManager::new()), config)
    }

    /// Build a pipeline around an externally owned cache.
    pub fn with_cache(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        tracker: Arc<dyn StoreClient>,
        wiki: Arc<dyn StoreClient>,
        cache: Arc<CacheManager>,
        config: PipelineConfig,
    ) -> Self {
        let model = model.into();
        Self {
            extractor: KeywordExtractor::new(llm.clone(), model.clone(), config.clone())
                .with_cache(Arc::clone(&cache)),
            judge: DataSourceJudge::new(config.clone()),
            executor: SearchExecutor::new(tracker, wiki, Arc::clone(&cache), config.clone()),
            merger: ResultMerger::new(config.strategy_weights),
            evaluator: QualityEvaluator::new(config.clone()),
            selector: AgentSelector::new(config.high_quality_threshold),
            research: ResearchAgent::new(llm.clone(), model.clone(), config.clone()),
            synthesis: SynthesisAgent::new(llm, model, config.clone()),
            emitter: StageEmitter::disabled(),
            cache,
            config,
        }
    }

    /// Attach a stage-event emitter.
    pub fn with_events(mut self, emitter: StageEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    /// The shared cache, for administrative commands.
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Accumulated routing statistics across runs.
    pub fn stats(&self) -> RunStats {
        self.selector.stats()
    }

    /// Run the full pipeline for one query.
    ///
    /// Bounded by the configured wall-clock budget; exceeding it returns a
    /// degraded best-effort outcome from whatever stages completed rather
    /// than an error. Run failures inside the stages degrade locally, so
    /// this only errors on programming mistakes surfaced by a component.
    pub async fn run(&self, query: Query) -> AppResult<PipelineOutcome> {
        let budget = Duration::from_millis(self.config.total_budget_ms);
        let snapshot = Arc::new(Mutex::new(Snapshot::default()));

        match tokio::time::timeout(budget, self.run_inner(&query, &snapshot)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    budget_ms = self.config.total_budget_ms,
                    "Run budget exhausted, returning best-effort outcome"
                );
                Ok(self.best_effort_outcome(&snapshot))
            }
        }
    }

    async fn run_inner(
        &self,
        query: &Query,
        snapshot: &Arc<Mutex<Snapshot>>,
    ) -> AppResult<PipelineOutcome> {
        let extraction = self.extractor.extract(query).await;
        self.emitter.emit(StageEvent::ExtractionCompleted {
            method: extraction.method,
            keyword_count: extraction.keywords.len(),
            confidence: extraction.confidence,
        });

        let mut decision = self.judge.judge(&extraction);
        apply_user_filters(&mut decision, query);
        self.emitter.emit(StageEvent::SourceJudged {
            primary: decision.primary,
            confidence: decision.confidence,
        });

        let results = self.executor.search(&decision, &extraction).await;
        self.emitter.emit(StageEvent::SearchCompleted {
            total_documents: results.iter().map(|r| r.documents.len()).sum(),
            failed_strategies: results.iter().filter(|r| r.failed).count(),
            cache_hits: results.iter().filter(|r| r.from_cache && !r.from_stale).count(),
        });

        let mut merged = self.merger.merge(&results);
        self.emitter.emit(StageEvent::Merged {
            unique_documents: merged.len(),
        });

        let score = self.evaluator.score(&merged, &extraction);
        self.emitter.emit(StageEvent::Scored {
            overall: score.overall,
        });

        let handover = self.selector.select(score);
        self.emitter.emit(StageEvent::PathSelected {
            path: handover.path,
            overall: score.overall,
        });

        if let Ok(mut snap) = snapshot.lock() {
            snap.merged = merged.clone();
            snap.score = Some(score);
            snap.decision = Some(handover.clone());
        }

        if handover.path == AnswerPath::FallbackResearch {
            let queries = self.research.expand_queries(&query.text, &extraction).await;
            if !queries.is_empty() {
                let exploratory = self.executor.explore(decision.primary, &queries).await;
                let extra = self.merger.merge(&exploratory);
                merged = self.merger.union(&merged, &extra);
                tracing::debug!(
                    exploratory_documents = extra.len(),
                    total = merged.len(),
                    "Exploratory round merged"
                );
                if let Ok(mut snap) = snapshot.lock() {
                    snap.merged = merged.clone();
                }
            }
        }

        let (answer, degraded) = self.synthesis.synthesize(&query.text, &merged).await;
        self.emitter.emit(StageEvent::Synthesized { degraded });

        Ok(PipelineOutcome {
            answer,
            decision: handover,
            score,
            merged,
            degraded,
        })
    }

    /// Degraded outcome built from the snapshot after budget exhaustion.
    fn best_effort_outcome(&self, snapshot: &Arc<Mutex<Snapshot>>) -> PipelineOutcome {
        let (merged, score, decision) = match snapshot.lock() {
            Ok(snap) => (snap.merged.clone(), snap.score, snap.decision.clone()),
            Err(_) => (MergedResult::default(), None, None),
        };

        let score = score.unwrap_or_else(QualityScore::zero);
        let decision = decision.unwrap_or_else(|| self.selector.select(score));

        let answer = if merged.is_empty() {
            agents::insufficient_information_answer()
        } else {
            agents::template_answer(&merged, self.config.template_top_n)
        };
        self.emitter.emit(StageEvent::Synthesized { degraded: true });

        PipelineOutcome {
            answer,
            decision,
            score,
            merged,
            degraded: true,
        }
    }
}

/// Fold user-supplied filters into the judged decision. An explicit scope
/// overrides the judge outright.
fn apply_user_filters(decision: &mut SourceDecision, query: &Query) {
    let Some(filters) = &query.filters else {
        return;
    };

    if let Some(scope) = filters.scope {
        decision.primary = scope;
        decision.confidence = 1.0;
        decision.rationale = "store scope fixed by the caller".to_string();
    }
    if let Some(ts) = filters.updated_after {
        decision.filters.push(FilterHint::UpdatedAfter(ts));
    }
    if let Some(project) = &filters.project {
        decision.filters.push(FilterHint::Project(project.clone()));
    }
    if let Some(space) = &filters.space {
        decision.filters.push(FilterHint::Space(space.clone()));
    }
}
