//! Finagent CLI
//!
//! Entry point for the financial document agent: ingestion, question
//! answering, interactive chat, direct calculations, search and evaluation.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AskCommand, CalcCommand, ChatCommand, DoctorCommand, EvalCommand, GoldenSetCommand,
    IndexCommand, IngestCommand, SearchCommand,
};
use finagent_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Finagent - financial document analysis with hybrid retrieval
#[derive(Parser, Debug)]
#[command(name = "finagent")]
#[command(about = "Financial document analysis with hybrid retrieval", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "FINAGENT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "FINAGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (azure-openai, ollama)
    #[arg(short, long, global = true, env = "FINAGENT_PROVIDER")]
    provider: Option<String>,

    /// Chat model or deployment
    #[arg(short, long, global = true, env = "FINAGENT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a directory of financial documents
    Ingest(IngestCommand),

    /// Ask the agent one question
    Ask(AskCommand),

    /// Interactive conversation with the agent
    Chat(ChatCommand),

    /// Run a financial calculation directly
    Calc(CalcCommand),

    /// Search the index without calling the model
    Search(SearchCommand),

    /// Search index maintenance
    Index(IndexCommand),

    /// Evaluate the agent against a golden set
    Eval(EvalCommand),

    /// Write a golden set template
    GoldenSet(GoldenSetCommand),

    /// Pre-flight configuration checks
    Doctor(DoctorCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest(_) => "ingest",
            Commands::Ask(_) => "ask",
            Commands::Chat(_) => "chat",
            Commands::Calc(_) => "calc",
            Commands::Search(_) => "search",
            Commands::Index(_) => "index",
            Commands::Eval(_) => "eval",
            Commands::GoldenSet(_) => "golden-set",
            Commands::Doctor(_) => "doctor",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace.as_deref(), cli.config.as_deref())?
        .with_overrides(
            cli.provider,
            cli.model,
            cli.log_level,
            cli.verbose,
            cli.no_color,
        );

    // Keep the guard alive so pending spans are flushed on exit
    let _telemetry = logging::init_logging_with_telemetry(
        config.log_level.as_deref(),
        config.no_color,
        &config.telemetry,
    )?;

    tracing::info!("Finagent CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Chat model: {}", config.chat_model());

    config.ensure_finagent_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Calc(cmd) => cmd.execute(),
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Eval(cmd) => cmd.execute(&config).await,
        Commands::GoldenSet(cmd) => cmd.execute(&config).await,
        Commands::Doctor(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    Ok(result?)
}
