//! Scout CLI
//!
//! Main entry point for the scout command-line tool.
//! Answers questions from a ticket tracker and a wiki through the
//! retrieval-and-decision pipeline.

mod commands;

use clap::{Parser, Subcommand};
use commands::AskCommand;
use scout_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Scout - question answering over a ticket tracker and a wiki
#[derive(Parser, Debug)]
#[command(name = "scout")]
#[command(about = "Question answering over a ticket tracker and a wiki", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "SCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, mock)
    #[arg(short, long, global = true, env = "SCOUT_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "SCOUT_MODEL")]
    model: Option<String>,

    /// Ticket tracker endpoint URL
    #[arg(long, global = true, env = "SCOUT_TRACKER_URL")]
    tracker_url: Option<String>,

    /// Wiki endpoint URL
    #[arg(long, global = true, env = "SCOUT_WIKI_URL")]
    wiki_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one or more questions
    Ask(AskCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let mut config = config.with_overrides(
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    if cli.tracker_url.is_some() {
        config.tracker_url = cli.tracker_url;
    }
    if cli.wiki_url.is_some() {
        config.wiki_url = cli.wiki_url;
    }

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Scout CLI starting");
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
