//! # Knowledge Harness CLI (`kh`)
//!
//! ## Usage
//!
//! ```bash
//! kh --config ./config/kh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kh init` | Create the SQLite database and schema |
//! | `kh sync` | Sync the source tree and publish a new snapshot |
//! | `kh search <query>` | Search the published content index |
//! | `kh related <name>` | Concepts directly connected to `name` |
//! | `kh highlight <file>` | Mark domain terms in a text file |
//! | `kh stats` | Summary of the committed snapshot |
//! | `kh history` | Sync ledger, newest first |
//! | `kh export --format <f>` | Export the concept graph |
//! | `kh serve` | Start the HTTP API |
//! | `kh completions <shell>` | Print shell completions |
//!
//! Log verbosity follows `RUST_LOG` (default `knowledge_harness=info`).

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use knowledge_harness::export::ExportFormat;
use knowledge_harness::{config, export, ingest, migrate, search, server, stats};

/// Knowledge Harness: incremental ontology, parsing, vector and graph sync.
///
/// All commands except `completions` read the TOML file given by
/// `--config`.
#[derive(Parser)]
#[command(
    name = "kh",
    about = "Knowledge Harness: incremental four-axis knowledge sync and retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Sync the configured source tree and publish a new snapshot.
    ///
    /// Only new, modified and deleted documents are processed. The run is
    /// committed as a whole or not at all.
    Sync {
        /// Revision identifier recorded in the ledger (e.g. a commit SHA).
        #[arg(long)]
        revision: Option<String>,

        /// Detect and classify only; print counts without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the published content index (title and keywords).
    Search {
        query: String,

        /// List every match instead of the first five.
        #[arg(long)]
        all: bool,
    },

    /// List concepts directly connected to a concept.
    Related { name: String },

    /// Print a text file with domain terms marked.
    Highlight { file: PathBuf },

    /// Summarise the committed snapshot.
    Stats,

    /// Show the sync ledger.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Export the committed concept graph.
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Serve the knowledge HTTP API on `[server] bind`.
    Serve,

    /// Print shell completions.
    Completions { shell: clap_complete::Shell },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("knowledge_harness=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        config: config_path,
        command,
    } = Cli::parse();
    // Only `completions` runs without a config file.
    let load = || config::load_config(&config_path);

    match command {
        Commands::Init => {
            migrate::run_migrations(&load()?).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync { revision, dry_run } => {
            ingest::run_sync(&load()?, revision, dry_run).await?;
        }
        Commands::Search { query, all } => {
            search::run_search(&load()?, &query, all).await?;
        }
        Commands::Related { name } => {
            search::run_related(&load()?, &name).await?;
        }
        Commands::Highlight { file } => {
            search::run_highlight(&load()?, &file).await?;
        }
        Commands::Stats => {
            stats::run_stats(&load()?).await?;
        }
        Commands::History { limit } => {
            stats::run_history(&load()?, limit).await?;
        }
        Commands::Export { format, output } => {
            export::run_export(&load()?, format, output.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&load()?).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "kh", &mut std::io::stdout());
        }
    }

    Ok(())
}
