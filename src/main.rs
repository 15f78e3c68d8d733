mod cli;
mod config;
mod db;
mod embedding;
mod error;
mod memory;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "memoir", version, about = "Tiered personal memory MCP server for AI assistants")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Store an attribute
    Remember {
        key: String,
        value: String,
        /// tier_a (identity) or tier_b (extended)
        #[arg(long, default_value = "tier_b")]
        tier: String,
        #[arg(long)]
        intent: Option<String>,
        /// user_explicit, user_implicit, assistant_inferred or imported
        #[arg(long, default_value = "user_explicit")]
        authority: String,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
    /// Forget an attribute
    Forget {
        key: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Show what would be recalled for a query
    Recall {
        query: String,
        /// Maximum Tier-B items
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        session: Option<String>,
    },
    /// Show identity attributes
    Identity,
    /// List every stored attribute with provenance
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show recent audit events
    Events {
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Apply a slash command, e.g. "/remember job=Engineer"
    Command {
        text: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Export all attributes as JSON to stdout
    Export,
    /// Import attributes from an export file
    Import { file: PathBuf },
    /// Check database health
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.memoir/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::MemoirConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve_stdio(config).await?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
        Command::Remember {
            key,
            value,
            tier,
            intent,
            authority,
            reason,
            session,
        } => cli::memory::remember(
            &config,
            cli::memory::RememberArgs {
                key,
                value,
                tier,
                intent,
                authority,
                reason,
                session,
            },
        )?,
        Command::Forget { key, session } => cli::memory::forget(&config, &key, session)?,
        Command::Recall { query, k, session } => cli::memory::recall(&config, &query, k, session)?,
        Command::Identity => cli::memory::identity(&config)?,
        Command::List { json } => cli::memory::list(&config, json)?,
        Command::Events { session, json } => cli::events::events(&config, session.as_deref(), json)?,
        Command::Command { text, session } => cli::memory::command(&config, &text, session)?,
        Command::Export => cli::export::export(&config)?,
        Command::Import { file } => cli::import::import(&config, &file)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
