//! # Filing Chat CLI (`fchat`)
//!
//! ## Usage
//!
//! ```bash
//! fchat --config ./config/fchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fchat serve` | Start the chat web server |
//! | `fchat catalog` | Print the year / quarter / document tree |
//! | `fchat ask` | Ask one question about one document |
//! | `fchat feedback <run_id>` | Rate a past answer |
//! | `fchat check` | Verify credentials and index connectivity |
//!
//! Credentials are read from `LANGCHAIN_API_KEY`, `OPENAI_API_KEY`,
//! `PINECONE_API_KEY`, and `LANGCHAIN_PROJECT`. Log verbosity follows
//! `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use filing_chat::feedback::FeedbackScale;
use filing_chat::{commands, config, server};

/// Filing Chat: retrieval-augmented chat over quarterly filings.
#[derive(Parser)]
#[command(name = "fchat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat web server.
    ///
    /// Binds to `[server].bind` and serves the chat page and JSON API.
    Serve,

    /// Print the document catalog.
    Catalog,

    /// Ask one question about one document and print the answer.
    Ask {
        #[arg(long)]
        year: String,

        #[arg(long)]
        quarter: String,

        /// Catalog document identifier (without `.pdf`).
        #[arg(long)]
        file: String,

        question: String,
    },

    /// Submit feedback for a previous answer.
    Feedback {
        /// Run id printed by `fchat ask` or returned by the server.
        run_id: Uuid,

        /// Feedback scale: `thumbs` or `faces`.
        #[arg(long, default_value = "faces")]
        scale: FeedbackScale,

        /// The symbol to submit, e.g. 👍 or 😐.
        #[arg(long)]
        symbol: String,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Verify credentials, catalog, and index connectivity.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Catalog => {
            commands::run_catalog(&cfg)?;
        }
        Commands::Ask {
            year,
            quarter,
            file,
            question,
        } => {
            commands::run_ask(&cfg, &year, &quarter, &file, &question).await?;
        }
        Commands::Feedback {
            run_id,
            scale,
            symbol,
            comment,
        } => {
            commands::run_feedback(&cfg, run_id, scale, &symbol, comment.as_deref()).await?;
        }
        Commands::Check => {
            commands::run_check(&cfg).await?;
        }
    }

    Ok(())
}
