//! Multi-axis quality scoring of merged results.
//!
//! Four axes, each in [0,1], combined under configured weights. Pure
//! functions over the merged list; the only failure mode is a bad weight
//! configuration, which degrades to a coverage-only scorer.

use crate::types::{ExtractionResult, MergedResult, QualityScore};
use chrono::Utc;
use scout_core::{AppResult, PipelineConfig};

/// Quality scoring engine.
pub struct QualityEvaluator {
    config: PipelineConfig,
}

impl QualityEvaluator {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Score a merged result set, degrading to the basic scorer if the
    /// multi-axis evaluator cannot run.
    pub fn score(&self, merged: &MergedResult, extraction: &ExtractionResult) -> QualityScore {
        match self.evaluate(merged, extraction) {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!("Multi-axis evaluator unavailable, using basic scorer: {}", e);
                basic_score(merged, extraction)
            }
        }
    }

    /// Full multi-axis evaluation.
    ///
    /// An empty merged result scores exactly 0.0 overall regardless of the
    /// axis values.
    pub fn evaluate(
        &self,
        merged: &MergedResult,
        extraction: &ExtractionResult,
    ) -> AppResult<QualityScore> {
        let weights = self.config.quality_weights;
        weights.validate()?;

        if merged.is_empty() {
            return Ok(QualityScore::zero());
        }

        let relevance = relevance(merged, extraction);
        let completeness = completeness(merged);
        let freshness = self.freshness(merged);
        let coverage = coverage(merged, extraction);

        let reliability = (completeness + freshness) / 2.0;
        let overall = (relevance * weights.relevance
            + reliability * weights.reliability
            + coverage * weights.effectiveness)
            .clamp(0.0, 1.0);

        Ok(QualityScore {
            relevance,
            completeness,
            freshness,
            coverage,
            overall,
        })
    }

    /// Mean linear recency decay: 1.0 for a document modified today, 0.0 at
    /// the staleness horizon, never negative.
    fn freshness(&self, merged: &MergedResult) -> f64 {
        let horizon = self.config.staleness_horizon_days as f64;
        let now = Utc::now();

        let sum: f64 = merged
            .documents
            .iter()
            .map(|scored| {
                let age_days = (now - scored.document.updated).num_days() as f64;
                (1.0 - age_days / horizon).clamp(0.0, 1.0)
            })
            .sum();

        sum / merged.len() as f64
    }
}

/// Fraction of extracted keywords appearing in a document's excerpt,
/// averaged over all documents.
fn relevance(merged: &MergedResult, extraction: &ExtractionResult) -> f64 {
    if extraction.keywords.is_empty() {
        return 0.0;
    }

    let sum: f64 = merged
        .documents
        .iter()
        .map(|scored| {
            let excerpt = scored.document.excerpt.to_lowercase();
            let matched = extraction
                .keywords
                .iter()
                .filter(|k| excerpt.contains(k.as_str()))
                .count();
            matched as f64 / extraction.keywords.len() as f64
        })
        .sum();

    (sum / merged.len() as f64).clamp(0.0, 1.0)
}

/// Fraction of documents carrying both a non-empty excerpt and a link.
fn completeness(merged: &MergedResult) -> f64 {
    let complete = merged
        .documents
        .iter()
        .filter(|scored| !scored.document.excerpt.is_empty() && !scored.document.url.is_empty())
        .count();
    complete as f64 / merged.len() as f64
}

/// Fraction of distinct keywords found in at least one title or excerpt.
fn coverage(merged: &MergedResult, extraction: &ExtractionResult) -> f64 {
    if extraction.keywords.is_empty() {
        return 0.0;
    }

    let covered = extraction
        .keywords
        .iter()
        .filter(|keyword| {
            merged.documents.iter().any(|scored| {
                scored.document.title.to_lowercase().contains(keyword.as_str())
                    || scored.document.excerpt.to_lowercase().contains(keyword.as_str())
            })
        })
        .count();

    covered as f64 / extraction.keywords.len() as f64
}

/// Keyword-match-only fallback scorer. Coverage is the one axis that needs
/// nothing but the documents and the keywords.
fn basic_score(merged: &MergedResult, extraction: &ExtractionResult) -> QualityScore {
    if merged.is_empty() {
        return QualityScore::zero();
    }
    let coverage = coverage(merged, extraction);
    QualityScore {
        relevance: 0.0,
        completeness: 0.0,
        freshness: 0.0,
        coverage,
        overall: coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtractionMethod, QuestionType, ScoredDocument};
    use scout_core::QualityWeights;
    use scout_store::{DocumentStore, MemoryStore, RawDocument};

    fn extraction(keywords: &[&str]) -> ExtractionResult {
        ExtractionResult {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            question_type: QuestionType::General,
            confidence: 0.9,
            method: ExtractionMethod::Llm,
        }
    }

    fn merged(documents: Vec<RawDocument>) -> MergedResult {
        MergedResult {
            documents: documents
                .into_iter()
                .map(|document| ScoredDocument {
                    document,
                    weight: 1.0,
                    best_rank: 0,
                })
                .collect(),
        }
    }

    fn doc(id: &str, title: &str, excerpt: &str, age_days: i64) -> RawDocument {
        MemoryStore::document(DocumentStore::Wiki, id, title, excerpt, age_days)
    }

    fn evaluator() -> QualityEvaluator {
        QualityEvaluator::new(PipelineConfig::default())
    }

    #[test]
    fn test_empty_result_scores_zero() {
        let score = evaluator()
            .evaluate(&MergedResult::default(), &extraction(&["login"]))
            .unwrap();
        assert_eq!(score.overall, 0.0);
    }

    #[test]
    fn test_fresh_complete_relevant_scores_high() {
        let merged = merged(vec![doc(
            "d1",
            "Login sessions",
            "login session expiry rules",
            0,
        )]);
        let score = evaluator()
            .evaluate(&merged, &extraction(&["login", "session"]))
            .unwrap();

        assert!((score.relevance - 1.0).abs() < 1e-9);
        assert!((score.completeness - 1.0).abs() < 1e-9);
        assert!(score.freshness > 0.99);
        assert!((score.coverage - 1.0).abs() < 1e-9);
        assert!(score.overall > 0.9);
        assert!(score.overall <= 1.0);
    }

    #[test]
    fn test_stale_document_loses_freshness() {
        let horizon = PipelineConfig::default().staleness_horizon_days;
        let ancient = merged(vec![doc("d1", "Login", "login", horizon + 100)]);
        let score = evaluator()
            .evaluate(&ancient, &extraction(&["login"]))
            .unwrap();
        // Floored at zero, never negative
        assert_eq!(score.freshness, 0.0);

        let halfway = merged(vec![doc("d1", "Login", "login", horizon / 2)]);
        let score = evaluator()
            .evaluate(&halfway, &extraction(&["login"]))
            .unwrap();
        assert!((score.freshness - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_missing_excerpt_hurts_completeness() {
        let merged = merged(vec![
            doc("d1", "Login", "login details", 0),
            doc("d2", "Login stub", "", 0),
        ]);
        let score = evaluator()
            .evaluate(&merged, &extraction(&["login"]))
            .unwrap();
        assert!((score.completeness - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_coverage_counts_titles() {
        // "billing" appears only in a title, never in an excerpt
        let merged = merged(vec![doc("d1", "Billing rules", "invoice cadence", 0)]);
        let score = evaluator()
            .evaluate(&merged, &extraction(&["billing", "refund"]))
            .unwrap();
        assert!((score.coverage - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_overall_always_in_unit_interval() {
        let cases = [
            merged(vec![]),
            merged(vec![doc("d1", "", "", 10_000)]),
            merged(vec![doc("d1", "Login", "login login login", 0)]),
        ];
        for case in &cases {
            let score = evaluator().evaluate(case, &extraction(&["login"])).unwrap();
            assert!((0.0..=1.0).contains(&score.overall));
        }
    }

    #[test]
    fn test_bad_weights_degrade_to_basic_scorer() {
        let mut config = PipelineConfig::default();
        config.quality_weights = QualityWeights {
            relevance: 0.9,
            reliability: 0.9,
            effectiveness: 0.9,
        };
        let evaluator = QualityEvaluator::new(config);

        let merged = merged(vec![doc("d1", "Login", "login", 0)]);
        let extraction = extraction(&["login"]);

        assert!(evaluator.evaluate(&merged, &extraction).is_err());

        let score = evaluator.score(&merged, &extraction);
        assert!((score.overall - 1.0).abs() < 1e-9);
        assert_eq!(score.relevance, 0.0);
    }
}
