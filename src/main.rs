//! # Site Harvest CLI (`harvest`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest sync` | Crawl sites and write one record per file |
//! | `harvest sites` | List discovered sites |
//! | `harvest groups <UPN>` | Print a user's transitive group identifiers |
//! | `harvest extract <FILE>` | Run text extraction on a local file |
//!
//! ## Examples
//!
//! ```bash
//! harvest sync --config ./config/harvest.toml
//! harvest sync --site "contoso.sharepoint.com,abc,def" --permissions --output ./out
//! harvest --log-json sync
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use site_harvest::{commands, config, logging};

/// Site Harvest: crawl document libraries into per-file metadata records.
#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Crawl document libraries into per-file metadata records",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl sites and write records.
    ///
    /// Sites come from `--site`, else from `sync.sites` when discovery is
    /// disabled, else from discovery.
    Sync {
        /// Site id to sync (repeatable). Skips discovery.
        #[arg(long = "site")]
        sites: Vec<String>,

        /// Resolve per-file permissions into an access policy.
        #[arg(long)]
        permissions: bool,

        /// Output root (overrides `output.root`).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List discovered sites.
    Sites,

    /// Print the transitive group identifiers of a user.
    Groups {
        /// User principal name, e.g. `alice@contoso.com`.
        user: String,
    },

    /// Extract text from a local file and print it.
    Extract {
        /// File to extract.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_json)?;

    // Local extraction needs no config
    if let Commands::Extract { file } = &cli.command {
        return commands::extract_file(file);
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync {
            sites,
            permissions,
            output,
        } => {
            let overrides = commands::SyncOverrides {
                sites,
                resolve_permissions: permissions,
                output,
            };
            commands::run_sync(&cfg, overrides).await?;
        }
        Commands::Sites => {
            commands::list_sites(&cfg).await?;
        }
        Commands::Groups { user } => {
            commands::show_groups(&cfg, &user).await?;
        }
        Commands::Extract { .. } => {}
    }

    Ok(())
}
