//! Keyword extraction.
//!
//! Turns a raw question into a normalized keyword set plus a question-type
//! label. The LLM path is preferred; any LLM failure (timeout, quota,
//! unparseable response) falls back to a deterministic rule-based extractor,
//! so extraction never fails outward.

use crate::cache::CacheManager;
use crate::types::{ExtractionMethod, ExtractionResult, Query, QuestionType};
use scout_core::{AppError, AppResult, PipelineConfig};
use scout_llm::{LlmClient, LlmRequest};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Generic tokens that carry no search signal.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "do", "does", "did", "can",
    "could", "will", "would", "should", "have", "has", "had", "of", "in", "on", "at", "to",
    "for", "from", "with", "about", "into", "and", "or", "but", "not", "no", "it", "its",
    "this", "that", "these", "those", "there", "i", "we", "you", "they", "me", "us", "my",
    "our", "your", "what", "when", "where", "which", "who", "why", "how", "please", "tell",
    "show", "find", "explain", "describe", "give", "want", "need", "know", "any", "some",
];

/// Domain synonym dictionary used for rule-based expansion. Read-only.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("login", &["authentication", "signin"]),
    ("logout", &["signout"]),
    ("bug", &["defect", "error"]),
    ("error", &["failure"]),
    ("api", &["endpoint", "interface"]),
    ("database", &["db", "schema"]),
    ("specification", &["spec"]),
    ("spec", &["specification"]),
    ("ui", &["screen", "frontend"]),
    ("password", &["credential"]),
    ("test", &["verification"]),
    ("deploy", &["release"]),
    ("session", &["token"]),
];

/// Trigger phrases per question type, in priority order. The first category
/// with a matching phrase wins; the default is General.
const TYPE_TRIGGERS: &[(QuestionType, &[&str])] = &[
    (
        QuestionType::Troubleshooting,
        &["error", "bug", "defect", "broken", "crash", "fail", "not working", "incident"],
    ),
    (
        QuestionType::ChangeRequest,
        &["change", "update", "modify", "improve", "migrate", "deprecate", "release"],
    ),
    (
        QuestionType::Procedure,
        &["how to", "how do", "steps", "procedure", "guide", "setup", "install", "configure"],
    ),
    (
        QuestionType::DesignDetail,
        &["design", "architecture", "schema", "data model", "structure", "internals"],
    ),
    (
        QuestionType::FeatureInquiry,
        &["feature", "specification", "spec", "behavior", "behaviour", "support", "capability"],
    ),
];

/// Confidence reported for LLM extractions that omit their own.
const DEFAULT_LLM_CONFIDENCE: f64 = 0.85;

/// Keyword payload expected from the LLM.
#[derive(Debug, Deserialize)]
struct LlmKeywordPayload {
    keywords: Vec<String>,
    confidence: Option<f64>,
}

/// Keyword extraction engine.
pub struct KeywordExtractor {
    llm: Arc<dyn LlmClient>,
    model: String,
    config: PipelineConfig,
    cache: Option<Arc<CacheManager>>,
}

impl KeywordExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, config: PipelineConfig) -> Self {
        Self {
            llm,
            model: model.into(),
            config,
            cache: None,
        }
    }

    /// Memoize extractions keyed on the normalized question text.
    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Extract keywords and a question type from a query.
    ///
    /// Never fails: LLM problems degrade to the rule-based path and the
    /// result is marked accordingly.
    pub async fn extract(&self, query: &Query) -> ExtractionResult {
        if let Some(cached) = self.lookup_memo(&query.text) {
            tracing::debug!("Extraction memo hit");
            return cached;
        }

        let result = match self.extract_with_llm(query).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("LLM extraction failed, falling back to rules: {}", e);
                self.extract_with_rules(&query.text)
            }
        };

        self.store_memo(&query.text, &result);

        tracing::info!(
            method = ?result.method,
            keywords = ?result.keywords,
            question_type = ?result.question_type,
            "Keyword extraction completed"
        );

        result
    }

    async fn extract_with_llm(&self, query: &Query) -> AppResult<ExtractionResult> {
        let prompt = build_extraction_prompt(query, self.config.max_keywords);
        let request = LlmRequest::new(prompt, self.model.clone())
            .with_temperature(0.1)
            .with_max_tokens(300);

        let timeout = Duration::from_millis(self.config.extraction_timeout_ms);
        let response = tokio::time::timeout(timeout, self.llm.complete(&request))
            .await
            .map_err(|_| AppError::LlmTimeout("keyword extraction".to_string()))??;

        let payload = parse_json_object::<LlmKeywordPayload>(&response.content)?;

        let keywords = normalize_keywords(payload.keywords, self.config.max_keywords);
        if keywords.is_empty() {
            return Err(AppError::LlmInvalidResponse(
                "LLM returned no usable keywords".to_string(),
            ));
        }

        let confidence = payload
            .confidence
            .unwrap_or(DEFAULT_LLM_CONFIDENCE)
            .clamp(0.0, 1.0);

        Ok(ExtractionResult {
            keywords,
            question_type: classify_question(&query.text),
            confidence,
            method: ExtractionMethod::Llm,
        })
    }

    /// Deterministic fallback: stop-word removal plus synonym expansion.
    fn extract_with_rules(&self, question: &str) -> ExtractionResult {
        let tokens: Vec<String> = question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();

        let retained: Vec<String> = tokens
            .iter()
            .filter(|t| !STOP_WORDS.contains(&t.as_str()) && t.len() > 1)
            .cloned()
            .collect();

        // Confidence reflects how much of the question survived stop-word
        // removal; an all-filler question gives the judge little to work with.
        let confidence = if tokens.is_empty() {
            0.0
        } else {
            (retained.len() as f64 / tokens.len() as f64).clamp(0.0, 1.0)
        };

        let mut keywords = retained.clone();
        for token in &retained {
            if let Some((_, synonyms)) = SYNONYMS.iter().find(|(base, _)| base == token) {
                keywords.extend(synonyms.iter().map(|s| s.to_string()));
            }
        }

        ExtractionResult {
            keywords: normalize_keywords(keywords, self.config.max_keywords),
            question_type: classify_question(question),
            confidence,
            method: ExtractionMethod::RuleBased,
        }
    }

    fn lookup_memo(&self, question: &str) -> Option<ExtractionResult> {
        let cache = self.cache.as_ref()?;
        let bytes = cache.get(&CacheManager::extraction_key(question))?;
        serde_json::from_slice(&bytes).ok()
    }

    fn store_memo(&self, question: &str, result: &ExtractionResult) {
        if let Some(cache) = &self.cache {
            if let Ok(bytes) = serde_json::to_vec(result) {
                cache.set(
                    CacheManager::extraction_key(question),
                    bytes,
                    Duration::from_secs(self.config.cache_ttl_secs),
                );
            }
        }
    }
}

/// Classify the question type with the fixed-priority trigger list.
pub fn classify_question(question: &str) -> QuestionType {
    let lowered = question.to_lowercase();
    for (question_type, triggers) in TYPE_TRIGGERS {
        if triggers.iter().any(|t| lowered.contains(t)) {
            return *question_type;
        }
    }
    QuestionType::General
}

/// Lowercase, trim, deduplicate preserving first occurrence, cap length.
fn normalize_keywords(keywords: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = Vec::new();
    for keyword in keywords {
        let normalized = keyword.trim().to_lowercase();
        if normalized.is_empty() || seen.contains(&normalized) {
            continue;
        }
        seen.push(normalized);
        if seen.len() == max {
            break;
        }
    }
    seen
}

/// Synonym-expanded variants of a keyword set, used as free-form queries by
/// the exploratory research round when the LLM cannot propose its own.
pub(crate) fn expand_with_synonyms(keywords: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = keywords.to_vec();
    for keyword in keywords {
        if let Some((_, synonyms)) = SYNONYMS.iter().find(|(base, _)| base == keyword) {
            candidates.extend(synonyms.iter().map(|s| s.to_string()));
        }
    }

    // dedup against the whole list, keeping first-occurrence order
    let mut queries: Vec<String> = Vec::new();
    for candidate in candidates {
        if !queries.contains(&candidate) {
            queries.push(candidate);
        }
    }
    queries
}

/// Pull the first JSON object out of an LLM response, tolerating prose
/// around it.
pub(crate) fn parse_json_object<T: serde::de::DeserializeOwned>(content: &str) -> AppResult<T> {
    let start = content.find('{').ok_or_else(|| {
        AppError::LlmInvalidResponse("no JSON object in LLM response".to_string())
    })?;
    let end = content.rfind('}').ok_or_else(|| {
        AppError::LlmInvalidResponse("unterminated JSON object in LLM response".to_string())
    })?;

    serde_json::from_str(&content[start..=end])
        .map_err(|e| AppError::LlmInvalidResponse(format!("bad JSON from LLM: {}", e)))
}

fn build_extraction_prompt(query: &Query, max_keywords: usize) -> String {
    let mut prompt = format!(
        "Extract the most specific search keywords from the user question below.\n\
         Rules:\n\
         - At most {} keywords, ordered by importance\n\
         - Keep concrete domain terms; drop filler verbs and question words\n\
         - Reply with JSON only: {{\"keywords\": [\"...\"], \"confidence\": 0.0}}\n\n",
        max_keywords
    );

    if let Some(context) = &query.context {
        prompt.push_str("Conversation context:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Question:\n");
    prompt.push_str(&query.text);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_llm::MockLlm;

    fn extractor(llm: MockLlm) -> KeywordExtractor {
        KeywordExtractor::new(Arc::new(llm), "mock", PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_llm_extraction_happy_path() {
        let llm = MockLlm::replying(
            r#"Here you go: {"keywords": ["login", "session timeout"], "confidence": 0.9}"#,
        );
        let result = extractor(llm)
            .extract(&Query::new("why does the login session time out?"))
            .await;

        assert_eq!(result.method, ExtractionMethod::Llm);
        assert_eq!(result.keywords, vec!["login", "session timeout"]);
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_llm_default_confidence() {
        let llm = MockLlm::replying(r#"{"keywords": ["billing"]}"#);
        let result = extractor(llm).extract(&Query::new("billing rules?")).await;
        assert!((result.confidence - DEFAULT_LLM_CONFIDENCE).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fallback_on_llm_timeout() {
        let llm = MockLlm::timing_out();
        let result = extractor(llm)
            .extract(&Query::new("login feature specification"))
            .await;

        assert_eq!(result.method, ExtractionMethod::RuleBased);
        assert!(result.keywords.contains(&"login".to_string()));
        assert!(result.keywords.contains(&"feature".to_string()));
        // All three tokens survive stop-word removal
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fallback_on_garbage_response() {
        let llm = MockLlm::replying("I cannot help with that.");
        let result = extractor(llm).extract(&Query::new("password reset steps")).await;
        assert_eq!(result.method, ExtractionMethod::RuleBased);
    }

    #[tokio::test]
    async fn test_rule_based_synonym_expansion() {
        let llm = MockLlm::timing_out();
        let result = extractor(llm).extract(&Query::new("login bug")).await;

        assert_eq!(result.method, ExtractionMethod::RuleBased);
        // Base terms come first, expansions after, capped at max_keywords
        assert_eq!(result.keywords[0], "login");
        assert_eq!(result.keywords[1], "bug");
        assert!(result.keywords.contains(&"authentication".to_string()));
        assert!(result.keywords.len() <= PipelineConfig::default().max_keywords);
    }

    #[test]
    fn test_synonym_expansion_has_no_duplicates() {
        // "spec" and "specification" are synonyms of each other, so each
        // re-proposes the other out of order
        let queries = expand_with_synonyms(&["spec".to_string(), "specification".to_string()]);
        assert_eq!(queries, vec!["spec".to_string(), "specification".to_string()]);

        let queries =
            expand_with_synonyms(&["login".to_string(), "authentication".to_string()]);
        let mut unique = queries.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(queries.len(), unique.len());
        assert_eq!(queries[0], "login");
    }

    #[tokio::test]
    async fn test_malformed_input_never_panics() {
        let llm = MockLlm::timing_out();
        let result = extractor(llm).extract(&Query::new("???   !!!")).await;
        assert_eq!(result.method, ExtractionMethod::RuleBased);
        assert!(result.keywords.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_memoization_skips_second_llm_call() {
        let cache = Arc::new(CacheManager::new());
        let llm = Arc::new(MockLlm::replying(r#"{"keywords": ["billing"]}"#));
        let extractor = KeywordExtractor::new(llm.clone(), "mock", PipelineConfig::default())
            .with_cache(cache);

        let query = Query::new("billing plan limits");
        extractor.extract(&query).await;
        extractor.extract(&query).await;

        assert_eq!(llm.call_count(), 1);
    }

    #[test]
    fn test_question_classification_priority() {
        // "error" (troubleshooting) outranks "specification" (feature)
        assert_eq!(
            classify_question("error in the login specification"),
            QuestionType::Troubleshooting
        );
        assert_eq!(
            classify_question("login feature specification"),
            QuestionType::FeatureInquiry
        );
        assert_eq!(
            classify_question("how to configure the mail relay"),
            QuestionType::Procedure
        );
        assert_eq!(classify_question("what about lunch"), QuestionType::General);
    }

    #[test]
    fn test_keyword_normalization() {
        let keywords = normalize_keywords(
            vec![
                " Login ".to_string(),
                "login".to_string(),
                "".to_string(),
                "Session".to_string(),
            ],
            5,
        );
        assert_eq!(keywords, vec!["login", "session"]);
    }
}
