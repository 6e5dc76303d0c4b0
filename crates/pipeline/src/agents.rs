//! Quality-gated answer generation.
//!
//! A scored run moves through a small state machine: scored, then either the
//! direct path (one synthesis call) or the fallback path (one exploratory
//! re-search round, then synthesis), and finally synthesized. Synthesis
//! failures degrade to a deterministic template answer; they never fail the
//! request.

use crate::extract;
use crate::types::{
    AnswerPath, ExtractionResult, HandoverDecision, MergedResult, QualityScore, RunStats,
};
use scout_core::{AppError, AppResult, PipelineConfig};
use scout_llm::{LlmClient, LlmRequest};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Upper bound on exploratory queries per fallback round.
const MAX_EXPLORATORY_QUERIES: usize = 4;

/// The one user-visible failure: nothing found and nothing cached.
pub fn insufficient_information_answer() -> String {
    "I could not find enough information in the ticket tracker or the wiki to \
     answer this question. Try rephrasing it or adding a project or space hint."
        .to_string()
}

/// Deterministic answer built from the top merged documents, used when
/// synthesis is unavailable.
pub fn template_answer(merged: &MergedResult, top_n: usize) -> String {
    let mut answer = String::from("Here are the most relevant documents I found:\n");
    for scored in merged.documents.iter().take(top_n) {
        answer.push_str(&format!(
            "- {} ({})\n",
            scored.document.title, scored.document.url
        ));
    }
    answer
}

/// Routes a scored run to an answer path and accumulates statistics.
pub struct AgentSelector {
    threshold: f64,
    sequence: AtomicU64,
    stats: Mutex<RunStats>,
}

impl AgentSelector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            sequence: AtomicU64::new(0),
            stats: Mutex::new(RunStats::default()),
        }
    }

    /// Pick the answer path for a score. At or above the threshold the run
    /// synthesizes directly; below it, one re-search round goes first.
    pub fn select(&self, score: QualityScore) -> HandoverDecision {
        let path = if score.overall >= self.threshold {
            AnswerPath::DirectSynthesis
        } else {
            AnswerPath::FallbackResearch
        };
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        if let Ok(mut stats) = self.stats.lock() {
            stats.record(path, score.overall);
        }

        tracing::info!(
            ?path,
            overall = score.overall,
            threshold = self.threshold,
            sequence,
            "Answer path selected"
        );

        HandoverDecision {
            path,
            score,
            sequence,
        }
    }

    /// Snapshot of the accumulated per-path statistics.
    pub fn stats(&self) -> RunStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }
}

/// Query payload expected from the exploratory LLM call.
#[derive(Debug, Deserialize)]
struct LlmQueryPayload {
    queries: Vec<String>,
}

/// Proposes free-form exploratory queries for the fallback path.
pub struct ResearchAgent {
    llm: Arc<dyn LlmClient>,
    model: String,
    config: PipelineConfig,
}

impl ResearchAgent {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, config: PipelineConfig) -> Self {
        Self {
            llm,
            model: model.into(),
            config,
        }
    }

    /// Expanded free-form queries, not constrained to the fixed strategies.
    ///
    /// Falls back to rule-based synonym expansion on any LLM failure.
    pub async fn expand_queries(&self, question: &str, extraction: &ExtractionResult) -> Vec<String> {
        let queries = match self.expand_with_llm(question, extraction).await {
            Ok(queries) if !queries.is_empty() => queries,
            Ok(_) => extract::expand_with_synonyms(&extraction.keywords),
            Err(e) => {
                tracing::warn!("LLM query expansion failed, using synonyms: {}", e);
                extract::expand_with_synonyms(&extraction.keywords)
            }
        };

        queries.into_iter().take(MAX_EXPLORATORY_QUERIES).collect()
    }

    async fn expand_with_llm(
        &self,
        question: &str,
        extraction: &ExtractionResult,
    ) -> AppResult<Vec<String>> {
        let prompt = format!(
            "The search keywords {:?} found too little to answer the question \
             below. Propose up to {} alternative search phrases, broader or \
             reworded. Reply with JSON only: {{\"queries\": [\"...\"]}}\n\n\
             Question:\n{}",
            extraction.keywords, MAX_EXPLORATORY_QUERIES, question
        );
        let request = LlmRequest::new(prompt, self.model.clone())
            .with_temperature(0.4)
            .with_max_tokens(200);

        let timeout = Duration::from_millis(self.config.extraction_timeout_ms);
        let response = tokio::time::timeout(timeout, self.llm.complete(&request))
            .await
            .map_err(|_| AppError::LlmTimeout("query expansion".to_string()))??;

        let payload = extract::parse_json_object::<LlmQueryPayload>(&response.content)?;
        Ok(payload
            .queries
            .into_iter()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty())
            .collect())
    }
}

/// Writes the final answer from the merged documents.
pub struct SynthesisAgent {
    llm: Arc<dyn LlmClient>,
    model: String,
    config: PipelineConfig,
}

impl SynthesisAgent {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, config: PipelineConfig) -> Self {
        Self {
            llm,
            model: model.into(),
            config,
        }
    }

    /// Synthesize an answer. Returns the text and whether it degraded to the
    /// template.
    pub async fn synthesize(&self, question: &str, merged: &MergedResult) -> (String, bool) {
        if merged.is_empty() {
            return (insufficient_information_answer(), true);
        }

        match self.synthesize_with_llm(question, merged).await {
            Ok(answer) => (answer, false),
            Err(e) => {
                tracing::warn!("Synthesis failed, returning template answer: {}", e);
                (template_answer(merged, self.config.template_top_n), true)
            }
        }
    }

    async fn synthesize_with_llm(
        &self,
        question: &str,
        merged: &MergedResult,
    ) -> AppResult<String> {
        let mut prompt = String::from(
            "Answer the question using only the documents below. Cite document \
             titles. Say so when the documents do not cover a part of the \
             question.\n\n",
        );
        for scored in merged.documents.iter().take(self.config.template_top_n) {
            prompt.push_str(&format!(
                "## {}\nLink: {}\n{}\n\n",
                scored.document.title, scored.document.url, scored.document.excerpt
            ));
        }
        prompt.push_str("Question:\n");
        prompt.push_str(question);

        let request = LlmRequest::new(prompt, self.model.clone())
            .with_temperature(0.2)
            .with_max_tokens(800);

        let timeout = Duration::from_millis(self.config.store_timeout_ms);
        let response = tokio::time::timeout(timeout, self.llm.complete(&request))
            .await
            .map_err(|_| AppError::LlmTimeout("answer synthesis".to_string()))??;

        let answer = response.content.trim().to_string();
        if answer.is_empty() {
            return Err(AppError::LlmInvalidResponse(
                "empty synthesis response".to_string(),
            ));
        }
        Ok(answer)
    }
}
