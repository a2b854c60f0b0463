//! # Sentiment Harness CLI (`senti`)
//!
//! ## Usage
//!
//! ```bash
//! senti --config ./config/senti.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `senti init` | Create the SQLite database and run schema migrations |
//! | `senti upload <path> --user U` | Upload a `.txt` or `.csv` file |
//! | `senti files --user U` | List uploaded files |
//! | `senti delete <file_id> --user U` | Delete an uploaded file |
//! | `senti analyze <file_id> --user U` | Run sentiment analysis |
//! | `senti results --user U` | List analysis results |
//! | `senti download <result_id> --user U` | Export a result as CSV or JSON |
//! | `senti serve` | Start the HTTP API server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sentiment_harness::{analyze, config, logging, migrate, results, server, upload};

/// Sentiment Harness CLI: batch sentiment analysis with durable results.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/senti.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "senti",
    about = "Sentiment Harness: batch sentiment analysis with durable, exportable results",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/senti.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `files` and `results`
    /// tables. Idempotent.
    Init,

    /// Upload a `.txt` or `.csv` file.
    Upload {
        /// Path to the file.
        path: PathBuf,

        /// Caller identity that will own the file.
        #[arg(long)]
        user: String,
    },

    /// List uploaded files, newest first.
    Files {
        #[arg(long)]
        user: String,
    },

    /// Delete an uploaded file and its stored blob.
    Delete {
        /// File id (UUID or store id).
        file_id: String,

        #[arg(long)]
        user: String,
    },

    /// Run sentiment analysis over an uploaded file.
    ///
    /// Prints the response (result URL plus summary and rows, or the
    /// overall verdict) as JSON.
    Analyze {
        /// File id (UUID or store id).
        file_id: String,

        #[arg(long)]
        user: String,

        /// Analysis mode: `per-unit` (one result per line or row) or
        /// `whole-document` (one result for the whole file).
        #[arg(long, default_value = "per-unit")]
        mode: String,
    },

    /// List analysis results, newest first.
    Results {
        #[arg(long)]
        user: String,
    },

    /// Export a result as CSV or JSON.
    Download {
        /// Result id (UUID or store id).
        result_id: String,

        #[arg(long)]
        user: String,

        /// Output format: `csv` or `json`.
        #[arg(long, default_value = "csv")]
        format: String,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { path, user } => {
            upload::run_upload(&cfg, &path, &user).await?;
        }
        Commands::Files { user } => {
            upload::run_files(&cfg, &user).await?;
        }
        Commands::Delete { file_id, user } => {
            upload::run_delete(&cfg, &file_id, &user).await?;
        }
        Commands::Analyze {
            file_id,
            user,
            mode,
        } => {
            analyze::run_analyze(&cfg, &file_id, &user, &mode).await?;
        }
        Commands::Results { user } => {
            results::run_results(&cfg, &user).await?;
        }
        Commands::Download {
            result_id,
            user,
            format,
            output,
        } => {
            results::run_download(&cfg, &result_id, &user, &format, output.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
