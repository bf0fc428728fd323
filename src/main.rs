//! # Invento CLI (`invento`)
//!
//! The `invento` binary manages the catalog index and starts the HTTP
//! server.
//!
//! ## Usage
//!
//! ```bash
//! invento --config ./config/invento.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `invento init` | Create the index with the item mapping if it is missing |
//! | `invento serve` | Prepare the index and start the HTTP server |
//! | `invento seed --yes` | Drop the index and load seed items |
//! | `invento drop --yes` | Delete the index |
//! | `invento info` | Show backend version and index status |
//! | `invento get <id>` | Print one item |
//! | `invento search <name>` | Exact name search |
//! | `invento create <name>` | Create an item |
//! | `invento rename <id> <name>` | Rename an item |
//! | `invento stock <id>` | Add stock to an item |

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use invento_search::catalog::Page;
use invento_search::commands;
use invento_search::config;

/// Invento: an inventory catalog over an Elasticsearch index.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/invento.example.toml` for a full example. A missing
/// file falls back to built-in defaults.
#[derive(Parser)]
#[command(
    name = "invento",
    about = "Invento: an inventory catalog served over an Elasticsearch index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/invento.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index with the item mapping if it does not exist.
    ///
    /// An existing index is left untouched after its mapping is checked.
    /// Safe to run repeatedly.
    Init,

    /// Start the HTTP server.
    ///
    /// Ensures the index exists first. The server runs until Ctrl-C.
    Serve {
        /// Drop and reseed the index with the demo items before serving.
        #[arg(long)]
        reset: bool,
    },

    /// Drop the index, recreate it, and load seed items.
    ///
    /// Destroys every document in the index.
    Seed {
        /// JSON array of items to load instead of the demo items.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Confirm that the existing index may be destroyed.
        #[arg(long)]
        yes: bool,
    },

    /// Delete the index and all its documents.
    Drop {
        /// Confirm that the index may be destroyed.
        #[arg(long)]
        yes: bool,
    },

    /// Show the backend version and whether the index mapping is current.
    Info,

    /// Print one item by id.
    Get {
        /// Item id.
        id: String,
    },

    /// Search items by exact name.
    Search {
        /// Item name to match exactly.
        name: String,

        /// Offset of the first result.
        #[arg(long, default_value_t = 0)]
        from: u32,

        /// Number of results (defaults to `[search].page_size`).
        #[arg(long)]
        size: Option<u32>,
    },

    /// Create an item with stock 1.
    Create {
        name: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Rename an item.
    Rename { id: String, name: String },

    /// Add stock to an item.
    Stock {
        id: String,

        /// Amount to add.
        #[arg(long, default_value_t = 1)]
        by: u64,
    },
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Destructive commands require confirmation before anything is loaded
    match &cli.command {
        Commands::Seed { yes: false, .. } => {
            bail!("`seed` deletes every document in the index; pass --yes to confirm")
        }
        Commands::Drop { yes: false } => {
            bail!("`drop` deletes the index; pass --yes to confirm")
        }
        _ => {}
    }

    let cfg = config::load_or_minimal(&cli.config)?;
    init_tracing(&cfg.logging.filter);

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Serve { reset } => commands::run_serve(&cfg, reset).await?,
        Commands::Seed { file, .. } => commands::run_seed(&cfg, file.as_deref()).await?,
        Commands::Drop { .. } => commands::run_drop(&cfg).await?,
        Commands::Info => commands::run_info(&cfg).await?,
        Commands::Get { id } => commands::run_get(&cfg, &id).await?,
        Commands::Search { name, from, size } => {
            commands::run_search(&cfg, &name, Page { from, size }).await?
        }
        Commands::Create { name, description } => {
            commands::run_create(&cfg, &name, &description).await?
        }
        Commands::Rename { id, name } => commands::run_rename(&cfg, &id, &name).await?,
        Commands::Stock { id, by } => commands::run_stock(&cfg, &id, by).await?,
    }

    Ok(())
}
