//! Ask command handler.
//!
//! Runs the pipeline for one or more questions. Questions asked in the same
//! invocation share the process-local cache, so repeats are answered without
//! touching the stores again.

use chrono::{NaiveDate, TimeZone, Utc};
use clap::Args;
use scout_core::{config::AppConfig, AppError, AppResult};
use scout_llm::create_client;
use scout_pipeline::{
    PipelineOutcome, Pipeline, Query, QueryFilters, SourceScope, StageEmitter, StageEvent,
};
use scout_store::{DocumentStore, RestStoreClient, StoreClient};
use std::sync::Arc;

/// Ask one or more questions
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The questions to answer
    #[arg(required = true, num_args = 1..)]
    pub questions: Vec<String>,

    /// Prior conversation context passed to the extractor
    #[arg(long)]
    pub context: Option<String>,

    /// Restrict the search to one store (tracker, wiki, both)
    #[arg(long)]
    pub scope: Option<String>,

    /// Tracker project key filter
    #[arg(long)]
    pub project: Option<String>,

    /// Wiki space key filter
    #[arg(long)]
    pub space: Option<String>,

    /// Only consider documents updated on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub updated_after: Option<NaiveDate>,

    /// Print each pipeline stage as it completes
    #[arg(long)]
    pub show_events: bool,

    /// Print routing statistics after the last question
    #[arg(long)]
    pub show_stats: bool,

    /// Output each outcome as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let llm = create_client(&config.provider, None)?;

        let tracker_url = config.tracker_url.as_deref().ok_or_else(|| {
            AppError::Config(
                "Tracker endpoint not configured (set SCOUT_TRACKER_URL or stores.trackerUrl)"
                    .to_string(),
            )
        })?;
        let wiki_url = config.wiki_url.as_deref().ok_or_else(|| {
            AppError::Config(
                "Wiki endpoint not configured (set SCOUT_WIKI_URL or stores.wikiUrl)".to_string(),
            )
        })?;

        let tracker: Arc<dyn StoreClient> =
            Arc::new(RestStoreClient::new(DocumentStore::Tracker, tracker_url));
        let wiki: Arc<dyn StoreClient> =
            Arc::new(RestStoreClient::new(DocumentStore::Wiki, wiki_url));

        let mut pipeline = Pipeline::new(
            llm,
            config.model.clone(),
            tracker,
            wiki,
            config.pipeline.clone(),
        );

        let mut events_task = None;
        if self.show_events {
            let (emitter, mut rx) = StageEmitter::channel();
            pipeline = pipeline.with_events(emitter);
            events_task = Some(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    eprintln!("  [{}]", render_event(&event));
                }
            }));
        }

        let filters = self.filters()?;
        for question in &self.questions {
            let mut query = Query::new(question.clone());
            if let Some(context) = &self.context {
                query = query.with_context(context.clone());
            }
            if let Some(filters) = filters.clone() {
                query = query.with_filters(filters);
            }

            let outcome = pipeline.run(query).await?;
            self.print_outcome(question, &outcome)?;
        }

        if self.show_stats {
            let stats = pipeline.stats();
            println!(
                "runs: {} ({} direct, {} fallback), average score {:.2}",
                stats.total_runs(),
                stats.direct_count,
                stats.fallback_count,
                stats.average_score
            );
        }

        // Close the emitter so the event task drains and finishes
        drop(pipeline);
        if let Some(task) = events_task {
            let _ = task.await;
        }

        Ok(())
    }

    fn filters(&self) -> AppResult<Option<QueryFilters>> {
        let scope = match self.scope.as_deref() {
            None => None,
            Some("tracker") => Some(SourceScope::Tracker),
            Some("wiki") => Some(SourceScope::Wiki),
            Some("both") => Some(SourceScope::Both),
            Some(other) => {
                return Err(AppError::Config(format!(
                    "Unknown scope '{}', expected tracker, wiki, or both",
                    other
                )))
            }
        };

        let updated_after = self
            .updated_after
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive));

        if scope.is_none()
            && updated_after.is_none()
            && self.project.is_none()
            && self.space.is_none()
        {
            return Ok(None);
        }

        Ok(Some(QueryFilters {
            scope,
            updated_after,
            project: self.project.clone(),
            space: self.space.clone(),
        }))
    }

    fn print_outcome(&self, question: &str, outcome: &PipelineOutcome) -> AppResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(outcome)?);
            return Ok(());
        }

        if self.questions.len() > 1 {
            println!("# {}", question);
        }
        println!("{}", outcome.answer);

        if !outcome.merged.is_empty() {
            println!("\nSources:");
            for scored in outcome.merged.documents.iter().take(3) {
                println!("  - {} ({})", scored.document.title, scored.document.url);
            }
        }

        println!(
            "\npath: {:?}, score: {:.2}{}",
            outcome.decision.path,
            outcome.score.overall,
            if outcome.degraded { ", degraded" } else { "" }
        );

        Ok(())
    }
}

fn render_event(event: &StageEvent) -> String {
    match event {
        StageEvent::ExtractionCompleted {
            method,
            keyword_count,
            confidence,
        } => format!(
            "extracted {} keywords ({:?}, confidence {:.2})",
            keyword_count, method, confidence
        ),
        StageEvent::SourceJudged {
            primary,
            confidence,
        } => format!("judged source {:?} (confidence {:.2})", primary, confidence),
        StageEvent::SearchCompleted {
            total_documents,
            failed_strategies,
            cache_hits,
        } => format!(
            "search done: {} documents, {} failed strategies, {} cache hits",
            total_documents, failed_strategies, cache_hits
        ),
        StageEvent::Merged { unique_documents } => {
            format!("merged to {} unique documents", unique_documents)
        }
        StageEvent::Scored { overall } => format!("scored {:.2}", overall),
        StageEvent::PathSelected { path, overall } => {
            format!("selected {:?} at {:.2}", path, overall)
        }
        StageEvent::Synthesized { degraded } => {
            if *degraded {
                "synthesized (degraded)".to_string()
            } else {
                "synthesized".to_string()
            }
        }
    }
}
