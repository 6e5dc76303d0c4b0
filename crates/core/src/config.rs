//! Configuration management for the Scout pipeline.
//!
//! This module handles loading and merging configuration from multiple
//! sources:
//! - Environment variables
//! - Command-line flags
//! - Config file (`scout.yaml`)
//!
//! There is no global settings singleton: configuration is an immutable
//! struct passed by reference into each component constructor, which keeps
//! unit tests independent of process-wide state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
///
/// Holds collaborator endpoints and global options; the pipeline tunables
/// live in the nested [`PipelineConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider (e.g., "ollama")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// API key for the LLM provider, if it needs one
    pub api_key: Option<String>,

    /// Ticket tracker endpoint URL
    pub tracker_url: Option<String>,

    /// Wiki endpoint URL
    pub wiki_url: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Pipeline tunables
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Weights for the quality axes.
///
/// The overall score is `relevance * relevance_weight + mean(completeness,
/// freshness) * reliability_weight + coverage * effectiveness_weight`.
/// The three weights must sum to exactly 1.0; they are configuration, not
/// constants baked into the evaluator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QualityWeights {
    pub relevance: f64,
    pub reliability: f64,
    pub effectiveness: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            relevance: 0.5,
            reliability: 0.4,
            effectiveness: 0.1,
        }
    }
}

impl QualityWeights {
    /// Validate that the weights form a convex combination.
    pub fn validate(&self) -> AppResult<()> {
        for (name, w) in [
            ("relevance", self.relevance),
            ("reliability", self.reliability),
            ("effectiveness", self.effectiveness),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(AppError::Config(format!(
                    "Quality weight '{}' out of range [0,1]: {}",
                    name, w
                )));
            }
        }

        let sum = self.relevance + self.reliability + self.effectiveness;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(AppError::Config(format!(
                "Quality weights must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(())
    }
}

/// Per-strategy base weights used by the result merger.
///
/// Ordered by precision: title-priority results are the most trustworthy,
/// phrase matches next, split-keyword matches the broadest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StrategyWeights {
    pub title_priority: f64,
    pub phrase: f64,
    pub split_keyword: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            title_priority: 1.0,
            phrase: 0.8,
            split_keyword: 0.6,
        }
    }
}

/// Tunables for the retrieval-and-decision pipeline.
///
/// Defaults follow the reference deployment; every threshold that the design
/// documents disagreed on (quality gate, axis weights) is a field here rather
/// than a constant in the algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Below this judge confidence, the primary source is forced to Both
    pub judge_confidence_threshold: f64,

    /// At or above this overall score the pipeline synthesizes directly;
    /// below it, one exploratory re-search round runs first
    pub high_quality_threshold: f64,

    /// Quality axis weights
    pub quality_weights: QualityWeights,

    /// Per-strategy merge weights
    pub strategy_weights: StrategyWeights,

    /// Documents older than this many days score 0.0 on freshness
    pub staleness_horizon_days: i64,

    /// Maximum keywords kept by the extractor
    pub max_keywords: usize,

    /// How many top keywords the strict split-keyword form AND-combines
    /// before relaxing to OR over all of them
    pub min_match_count: usize,

    /// Maximum results requested per strategy call
    pub max_results_per_strategy: usize,

    /// Number of documents used by the template (degraded) answer
    pub template_top_n: usize,

    /// Timeout for the keyword-extraction LLM call, in milliseconds
    pub extraction_timeout_ms: u64,

    /// Per store-call timeout, in milliseconds
    pub store_timeout_ms: u64,

    /// Backoff before the single retry of a transient store failure
    pub retry_backoff_ms: u64,

    /// Hard wall-clock budget for a whole pipeline run, in milliseconds
    pub total_budget_ms: u64,

    /// TTL for cached search results, in seconds
    pub cache_ttl_secs: u64,

    /// Relaxed TTL for last-known-good substitution, in seconds
    pub stale_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            judge_confidence_threshold: 0.7,
            high_quality_threshold: 0.75,
            quality_weights: QualityWeights::default(),
            strategy_weights: StrategyWeights::default(),
            staleness_horizon_days: 730,
            max_keywords: 5,
            min_match_count: 2,
            max_results_per_strategy: 50,
            template_top_n: 3,
            extraction_timeout_ms: 2_000,
            store_timeout_ms: 5_000,
            retry_backoff_ms: 250,
            total_budget_ms: 8_000,
            cache_ttl_secs: 3_600,
            stale_ttl_secs: 86_400,
        }
    }
}

impl PipelineConfig {
    /// Validate cross-field invariants.
    pub fn validate(&self) -> AppResult<()> {
        self.quality_weights.validate()?;

        for (name, v) in [
            ("judge_confidence_threshold", self.judge_confidence_threshold),
            ("high_quality_threshold", self.high_quality_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(AppError::Config(format!(
                    "{} out of range [0,1]: {}",
                    name, v
                )));
            }
        }

        if self.staleness_horizon_days <= 0 {
            return Err(AppError::Config(
                "staleness_horizon_days must be positive".to_string(),
            ));
        }

        if self.max_keywords == 0 {
            return Err(AppError::Config("max_keywords must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileConfig>,
    stores: Option<StoresFileConfig>,
    logging: Option<LoggingFileConfig>,
    pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmFileConfig {
    provider: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StoresFileConfig {
    #[serde(rename = "trackerUrl")]
    tracker_url: Option<String>,
    #[serde(rename = "wikiUrl")]
    wiki_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingFileConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            tracker_url: None,
            wiki_url: None,
            log_level: None,
            verbose: false,
            no_color: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `SCOUT_CONFIG`: Path to config file
    /// - `SCOUT_PROVIDER`: LLM provider
    /// - `SCOUT_MODEL`: Model identifier
    /// - `SCOUT_API_KEY`: API key
    /// - `SCOUT_TRACKER_URL` / `SCOUT_WIKI_URL`: store endpoints
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(config_file) = std::env::var("SCOUT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        // Load from YAML config file if it exists
        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("scout.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("SCOUT_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("SCOUT_MODEL") {
            config.model = model;
        }

        if let Ok(url) = std::env::var("SCOUT_TRACKER_URL") {
            config.tracker_url = Some(url);
        }

        if let Ok(url) = std::env::var("SCOUT_WIKI_URL") {
            config.wiki_url = Some(url);
        }

        config.api_key = std::env::var("SCOUT_API_KEY").ok().or(config.api_key);
        config.log_level = std::env::var("RUST_LOG").ok().or(config.log_level);

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.pipeline.validate()?;

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
        }

        if let Some(stores) = config_file.stores {
            if stores.tracker_url.is_some() {
                result.tracker_url = stores.tracker_url;
            }
            if stores.wiki_url.is_some() {
                result.wiki_url = stores.wiki_url;
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables.
    pub fn with_overrides(
        mut self,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert!(!config.verbose);
        assert!(config.pipeline.validate().is_ok());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = QualityWeights::default();
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let weights = QualityWeights {
            relevance: 0.7,
            reliability: 0.4,
            effectiveness: 0.1,
        };
        assert!(weights.validate().is_err());

        let negative = QualityWeights {
            relevance: -0.1,
            reliability: 1.0,
            effectiveness: 0.1,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_pipeline_threshold_ranges() {
        let mut config = PipelineConfig::default();
        config.high_quality_threshold = 1.5;
        assert!(config.validate().is_err());

        config.high_quality_threshold = 0.6;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            Some("ollama".to_string()),
            Some("llama3".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.model, "llama3");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_strategy_weights_precision_order() {
        let w = StrategyWeights::default();
        assert!(w.title_priority > w.phrase);
        assert!(w.phrase > w.split_keyword);
    }
}
