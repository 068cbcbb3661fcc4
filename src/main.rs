//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and schema |
//! | `docqa ingest <path>` | Upload and process a file or a directory of files |
//! | `docqa list` | List documents and their processing status |
//! | `docqa get <id>` | Show a document and its chunks |
//! | `docqa delete <id>` | Delete a document, its chunks and its blob |
//! | `docqa context "<q>"` | Print the context bundle selected for a question |
//! | `docqa ask "<q>"` | Answer a question from the documents (streams) |
//! | `docqa serve` | Start the HTTP API |
//!
//! Logs go to stderr; set `RUST_LOG` to adjust verbosity.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docqa::app::App;
use docqa::chat::{self, ChatRequest};
use docqa::{config, documents, ingest, migrate, retrieve, server};

const DEFAULT_LOG_FILTER: &str = "docqa=info,tower_http=info";

/// docqa: ask questions about your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "docqa: ask questions about your PDF, DOCX, CSV and TXT documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Upload and process a file, or every supported file in a directory.
    ///
    /// Supported extensions: pdf, docx, csv, txt. Other files in a
    /// directory are skipped.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,

        /// Store the document under this name (single file only).
        #[arg(long)]
        name: Option<String>,
    },

    /// List documents, newest first.
    List,

    /// Show a document's metadata and chunks.
    Get {
        /// Document UUID.
        id: String,
    },

    /// Delete a document, its chunks and its stored file.
    Delete {
        /// Document UUID.
        id: String,
    },

    /// Print the context selected for a question as JSON, without calling the LLM.
    Context {
        /// The question.
        query: String,

        /// Restrict to these document ids (repeatable).
        #[arg(long = "doc")]
        docs: Vec<String>,
    },

    /// Answer a question from the ingested documents.
    Ask {
        /// The question.
        query: String,

        /// Restrict to these document ids (repeatable).
        #[arg(long = "doc")]
        docs: Vec<String>,

        /// Continue an existing conversation.
        #[arg(long)]
        conversation: Option<String>,

        /// Wait for the full answer instead of streaming tokens.
        #[arg(long)]
        no_stream: bool,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let app = App::open(&cfg).await?;
    let result = match cli.command {
        Commands::Init => Ok(()),
        Commands::Ingest { path, name } => ingest::run_ingest(&app, &path, name.as_deref()).await,
        Commands::List => documents::run_list(&app).await,
        Commands::Get { id } => documents::run_get(&app, &id).await,
        Commands::Delete { id } => documents::run_delete(&app, &id).await,
        Commands::Context { query, docs } => retrieve::run_context(&app, &query, &docs).await,
        Commands::Ask {
            query,
            docs,
            conversation,
            no_stream,
        } => {
            let req = ChatRequest {
                message: query,
                document_ids: docs,
                conversation_id: conversation,
            };
            chat::run_ask(&app, req, !no_stream).await
        }
        Commands::Serve => server::run_server(app.clone()).await,
    };

    app.close().await;
    result
}
