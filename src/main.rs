//! # Docbot CLI
//!
//! The `docbot` binary is the primary interface for Docbot. It provides
//! commands for database initialization, document ingestion, retrieval
//! inspection, one-shot questions, embedding management, and starting the
//! chat API server.
//!
//! ## Usage
//!
//! ```bash
//! docbot --config ./config/docbot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docbot init` | Create the SQLite database and run schema migrations |
//! | `docbot ingest` | Index the docs directory (idempotent) |
//! | `docbot search "<query>"` | Retrieve the closest chunks for a query |
//! | `docbot ask "<question>"` | One-shot retrieval-augmented question |
//! | `docbot show <source>` | Print an indexed document's chunks |
//! | `docbot stats` | Show index counts and embedding coverage |
//! | `docbot embed pending` | Backfill missing embeddings |
//! | `docbot embed rebuild` | Delete and regenerate all embeddings |
//! | `docbot serve` | Start the HTTP chat API |

mod chat;
mod chunk;
mod completion;
mod config;
mod db;
mod embed_cmd;
mod embedding;
mod ingest;
mod migrate;
mod models;
mod retrieve;
mod server;
mod session;
mod show;
mod stats;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Docbot CLI — a retrieval-augmented chat backend for document
/// collections.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docbot.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docbot",
    about = "Docbot — a retrieval-augmented chat backend for document collections",
    version,
    long_about = "Docbot ingests a directory of plain-text documents into a persistent \
    vector index and answers chat messages by retrieving the closest chunks and forwarding \
    an augmented prompt to a hosted language-model API, keeping per-session history."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docbot.toml`. All database, docs, embedding,
    /// llm, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/docbot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, chunks, chunk_vectors). This command is idempotent —
    /// running it multiple times is safe.
    Init,

    /// Index the docs directory.
    ///
    /// Scans the configured directory, splits each document on blank-line
    /// boundaries, and stores the chunks with embeddings. Idempotent:
    /// unchanged files (by content hash) are skipped; changed files are
    /// re-indexed.
    Ingest {
        /// Re-index every document regardless of its stored content hash.
        #[arg(long)]
        full: bool,

        /// Show file and chunk counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Retrieve the closest chunks for a query.
    ///
    /// Embeds the query and prints the top matches with similarity
    /// scores and source attribution.
    Search {
        /// The query string.
        query: String,

        /// Maximum number of chunks to return (defaults to retrieval.top_k).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Ask a one-shot question (no session history).
    ///
    /// Retrieves context for the question, calls the language model, and
    /// prints both the context used and the reply.
    Ask {
        /// The question to ask.
        question: String,

        /// Maximum number of context chunks (defaults to retrieval.top_k).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Print an indexed document's chunks by source name.
    Show {
        /// Source name (relative path within the docs directory).
        source: String,
    },

    /// Show index counts and embedding coverage.
    Stats,

    /// Manage embedding vectors.
    ///
    /// Subcommands for backfilling and rebuilding vectors. Requires an
    /// embedding provider to be configured.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Start the HTTP chat API.
    ///
    /// Runs migrations and startup ingestion, then binds to the address
    /// configured in `[server].bind` and serves chat requests.
    Serve,
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Embed chunks that are missing vectors for the configured model.
    Pending {
        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete and regenerate all embeddings.
    ///
    /// Useful when switching embedding models or dimensions.
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { full, dry_run } => {
            ingest::run_ingest(&cfg, full, dry_run).await?;
        }
        Commands::Search { query, top_k } => {
            retrieve::run_search(&cfg, &query, top_k).await?;
        }
        Commands::Ask { question, top_k } => {
            chat::run_ask(&cfg, &question, top_k).await?;
        }
        Commands::Show { source } => {
            show::run_show(&cfg, &source).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending { dry_run } => {
                embed_cmd::run_embed_pending(&cfg, dry_run).await?;
            }
            EmbedAction::Rebuild => {
                embed_cmd::run_embed_rebuild(&cfg).await?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
