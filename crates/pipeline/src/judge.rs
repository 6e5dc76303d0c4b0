//! Data-source judgment.
//!
//! Decides which store(s) to search by bucketing keywords against a static
//! affinity table. Weak signal defers to both stores: recall over precision.

use crate::types::{ExtractionResult, FilterHint, QuestionType, SourceDecision, SourceScope};
use scout_core::PipelineConfig;

/// Substring patterns implying tracker content (defects, tasks, status).
const TRACKER_PATTERNS: &[&str] = &[
    "bug", "defect", "error", "fail", "crash", "incident", "ticket", "issue", "task", "status",
    "fix", "regression", "blocker", "sprint", "backlog", "priority",
];

/// Substring patterns implying wiki content (specifications, procedures,
/// design).
const WIKI_PATTERNS: &[&str] = &[
    "spec", "design", "architecture", "procedure", "guide", "manual", "policy", "feature",
    "document", "overview", "requirement", "onboarding", "glossary", "runbook", "howto",
];

/// Date window, in days, applied when the question is about recent breakage.
const TROUBLESHOOTING_WINDOW_DAYS: i64 = 90;

/// Date window, in days, applied to change-request questions.
const CHANGE_REQUEST_WINDOW_DAYS: i64 = 180;

/// Store-affinity judge. Deterministic for identical input.
pub struct DataSourceJudge {
    config: PipelineConfig,
}

impl DataSourceJudge {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Pick the primary store scope for an extraction.
    ///
    /// Confidence is the normalized margin between the two affinity buckets;
    /// below the configured threshold the judge refuses to pick a side and
    /// returns `Both`.
    pub fn judge(&self, extraction: &ExtractionResult) -> SourceDecision {
        let total = extraction.keywords.len();

        let tracker_hits = count_hits(&extraction.keywords, TRACKER_PATTERNS);
        let wiki_hits = count_hits(&extraction.keywords, WIKI_PATTERNS);

        let confidence = if total == 0 {
            0.0
        } else {
            ((tracker_hits as f64 - wiki_hits as f64).abs() / total as f64).clamp(0.0, 1.0)
        };

        let dominant = if tracker_hits > wiki_hits {
            SourceScope::Tracker
        } else if wiki_hits > tracker_hits {
            SourceScope::Wiki
        } else {
            SourceScope::Both
        };

        let primary = if confidence < self.config.judge_confidence_threshold {
            SourceScope::Both
        } else {
            dominant
        };

        let rationale = format!(
            "{} of {} keywords match tracker patterns, {} match wiki patterns; \
             margin {:.2} against threshold {:.2}",
            tracker_hits, total, wiki_hits, confidence, self.config.judge_confidence_threshold
        );

        let decision = SourceDecision {
            primary,
            confidence,
            rationale,
            filters: filter_hints(extraction.question_type),
        };

        tracing::debug!(
            primary = ?decision.primary,
            confidence = decision.confidence,
            "Source judgment: {}",
            decision.rationale
        );

        decision
    }
}

fn count_hits(keywords: &[String], patterns: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|keyword| patterns.iter().any(|p| keyword.contains(p)))
        .count()
}

/// Fixed question-type to filter-hint table.
fn filter_hints(question_type: QuestionType) -> Vec<FilterHint> {
    match question_type {
        QuestionType::Troubleshooting => {
            vec![FilterHint::UpdatedWithinDays(TROUBLESHOOTING_WINDOW_DAYS)]
        }
        QuestionType::ChangeRequest => {
            vec![FilterHint::UpdatedWithinDays(CHANGE_REQUEST_WINDOW_DAYS)]
        }
        QuestionType::Procedure | QuestionType::DesignDetail => vec![FilterHint::PagesOnly],
        QuestionType::FeatureInquiry | QuestionType::General => Vec::new(),
    }
}
