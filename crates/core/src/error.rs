//! Error types for the Scout pipeline.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, collaborator failures (LLM and document
//! stores), and the per-stage pipeline errors. Every pipeline stage error has
//! a defined degraded continuation; none of them is fatal to a request.

use thiserror::Error;

/// Unified error type for the Scout pipeline.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic — errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM call exceeded its timeout
    #[error("LLM timeout: {0}")]
    LlmTimeout(String),

    /// LLM provider rejected the call for quota reasons
    #[error("LLM quota exhausted: {0}")]
    LlmQuota(String),

    /// LLM returned a response that could not be parsed
    #[error("LLM invalid response: {0}")]
    LlmInvalidResponse(String),

    /// Document store rejected the credentials
    #[error("Store authentication failed: {0}")]
    StoreAuth(String),

    /// Document store rejected the structured query
    #[error("Store query malformed: {0}")]
    StoreQuery(String),

    /// Document store unreachable or connection dropped
    #[error("Store network error: {0}")]
    StoreNetwork(String),

    /// Keyword extraction failed (recovered via rule-based fallback)
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Source judgment failed (recovered by defaulting to both stores)
    #[error("Judgment error: {0}")]
    Judgment(String),

    /// Search execution failed (recovered per strategy / via stale cache)
    #[error("Search error: {0}")]
    Search(String),

    /// Quality evaluation failed (recovered by the basic scorer)
    #[error("Quality error: {0}")]
    Quality(String),

    /// Agent synthesis failed (recovered by the template answer)
    #[error("Agent error: {0}")]
    Agent(String),

    /// Cache access failed
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the failure is transient and worth a single retry.
    ///
    /// Only network-level store failures and LLM timeouts qualify.
    /// Authentication and malformed-query errors are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StoreNetwork(_) | AppError::LlmTimeout(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::StoreNetwork("reset".into()).is_transient());
        assert!(AppError::LlmTimeout("2s".into()).is_transient());
        assert!(!AppError::StoreAuth("401".into()).is_transient());
        assert!(!AppError::StoreQuery("bad field".into()).is_transient());
        assert!(!AppError::Config("missing".into()).is_transient());
    }

    #[test]
    fn test_display_includes_category() {
        let err = AppError::StoreQuery("unbalanced quotes".into());
        assert!(err.to_string().contains("query malformed"));
    }
}
