//! Ragbot CLI
//!
//! Main entry point for the ragbot command-line tool.
//! Answers questions from local documents with a web search fallback.

mod commands;
mod services;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChunkCommand, DocumentsCommand, HealthCommand, IngestCommand};
use ragbot_core::config::{AppConfig, RAGBOT_DIR};
use ragbot_core::logging::{self, LogFormat};
use ragbot_core::AppResult;
use services::Services;
use std::path::PathBuf;

/// Ragbot - retrieval-augmented answers over local documents
#[derive(Parser, Debug)]
#[command(name = "ragbot")]
#[command(about = "Retrieval-augmented answers over local documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RAGBOT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "RAGBOT_CONFIG")]
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

    /// Model identifier
    #[arg(short, long, global = true, env = "RAGBOT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question from the ingested documents
    Ask(AskCommand),

    /// Ingest files or directories into the knowledge base
    Ingest(IngestCommand),

    /// Show how a file would be chunked
    Chunk(ChunkCommand),

    /// List or delete ingested documents
    Documents(DocumentsCommand),

    /// Check the availability of every collaborator
    Health(HealthCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ask(_) => "ask",
            Commands::Ingest(_) => "ingest",
            Commands::Chunk(_) => "chunk",
            Commands::Documents(_) => "documents",
            Commands::Health(_) => "health",
        }
    }
}

/// Load configuration, honouring a workspace or config file given on the
/// command line.
fn load_config(cli: &Cli) -> AppResult<AppConfig> {
    let mut config = AppConfig::load()?;

    let file = cli.config.clone().or_else(|| {
        cli.workspace
            .as_ref()
            .map(|workspace| workspace.join(RAGBOT_DIR).join("config.yaml"))
    });
    if let Some(file) = file.filter(|f| f.exists()) {
        config = config.merge_yaml(&file)?;
    }

    Ok(config.with_overrides(
        cli.workspace.clone(),
        cli.config.clone(),
        cli.model.clone(),
        cli.log_level.clone(),
        cli.verbose,
        cli.no_color,
    ))
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = load_config(&cli)?;

    logging::init_logging_with_format(
        config.log_level.as_deref(),
        config.no_color,
        LogFormat::parse(&config.log_format)?,
    )?;

    tracing::info!("Ragbot CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Model: {}", config.llm.model);

    config.ensure_ragbot_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    // Chunk previews need no collaborators
    let result = match cli.command {
        Commands::Chunk(cmd) => cmd.execute(&config),
        Commands::Ask(cmd) => cmd.execute(&config, &Services::from_config(&config)?).await,
        Commands::Ingest(cmd) => cmd.execute(&Services::from_config(&config)?).await,
        Commands::Documents(cmd) => cmd.execute(&Services::from_config(&config)?).await,
        Commands::Health(cmd) => cmd.execute(&config, &Services::from_config(&config)?).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
