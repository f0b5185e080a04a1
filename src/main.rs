//! # Study Partner CLI (`study`)
//!
//! The `study` binary ingests AWS certification PDFs into a vector index
//! and serves the study assistant over HTTP or an interactive prompt.
//!
//! ## Usage
//!
//! ```bash
//! study --config ./config/study.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `study process` | Extract and chunk PDFs into JSON |
//! | `study upload` | Create the index if needed and upload chunks |
//! | `study ingest` | `process` followed by `upload` |
//! | `study search "<query>"` | Print the nearest chunks |
//! | `study serve` | Start the HTTP API |
//! | `study ask` | Interactive study session |
//!
//! ## Examples
//!
//! ```bash
//! # Chunk everything in data/raw
//! study process --raw-dir data/raw --out-dir data/processed
//!
//! # Resume an upload that failed at chunk 450
//! study upload --start-from 450
//!
//! # Check retrieval
//! study search "S3 storage classes" --limit 3
//!
//! # Start the API for the web frontend
//! study serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use study_partner::{config, ingest, logging, repl, search, server};

/// Study Partner CLI: a retrieval-augmented study assistant for AWS
/// certification exams.
#[derive(Parser)]
#[command(
    name = "study",
    about = "Study Partner: a retrieval-augmented study assistant for AWS certification exams",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/study.toml`. A missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/study.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,

    /// Extract and chunk every PDF in a directory.
    ///
    /// Writes `<name>_chunks.json` per PDF and a combined `all_chunks.json`.
    Process {
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,

        #[arg(long, default_value = "data/processed")]
        out_dir: PathBuf,
    },

    /// Upload a chunks file into the vector index.
    ///
    /// Creates the index first when the backend needs it. A failed batch
    /// prints the offset to pass to `--start-from`.
    Upload {
        #[arg(long, default_value = "data/processed/all_chunks.json")]
        file: PathBuf,

        /// Chunks per batch (defaults to `[index].upload_batch_size`).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Skip the first N chunks.
        #[arg(long, default_value_t = 0)]
        start_from: usize,
    },

    /// Process PDFs and upload the result.
    Ingest {
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,

        #[arg(long, default_value = "data/processed")]
        out_dir: PathBuf,
    },

    /// Print the chunks nearest to a query.
    Search {
        query: String,

        #[arg(long, default_value_t = 2)]
        limit: usize,
    },

    /// Interactive study session.
    Ask,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Process { raw_dir, out_dir } => {
            ingest::run_process(&cfg, &raw_dir, &out_dir)?;
        }
        Commands::Upload {
            file,
            batch_size,
            start_from,
        } => {
            ingest::run_upload(&cfg, &file, batch_size, start_from).await?;
        }
        Commands::Ingest { raw_dir, out_dir } => {
            ingest::run_ingest(&cfg, &raw_dir, &out_dir).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Ask => {
            repl::run_repl(&cfg).await?;
        }
    }

    Ok(())
}
