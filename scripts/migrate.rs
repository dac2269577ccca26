#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sacristia::{config::AppConfig, config::StoreConfig, db, migrate};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "migrate", about = "Sacristia schema migration helper")]
struct Cli {
    /// Explicit DB path (defaults to the configured local store)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Operate on the configured remote store instead of the local one
    #[arg(long, conflicts_with = "db")]
    remote: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List migrations and show applied/pending
    List,
    /// Show how many migrations are pending
    Status,
    /// Apply pending migrations
    Up,
}

#[tokio::main]
async fn main() -> Result<()> {
    sacristia::logging::init();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("read configuration")?;
    let store_cfg = match (&cli.db, cli.remote) {
        (Some(path), _) => StoreConfig::new(path.clone()),
        (None, true) => config.remote,
        (None, false) => config.local,
    };

    let pool = db::open_pool(&store_cfg).await.context("open database")?;
    let applied = migrate::applied_versions(&pool).await?;

    match cli.cmd {
        Cmd::List => {
            for version in migrate::versions() {
                let state = if applied.iter().any(|v| v == version) {
                    "applied"
                } else {
                    "pending"
                };
                println!("{state:>8}  {version}");
            }
        }
        Cmd::Status => {
            let pending = migrate::versions()
                .iter()
                .filter(|v| !applied.iter().any(|a| a == *v))
                .count();
            println!(
                "{} applied, {} pending ({})",
                applied.len(),
                pending,
                store_cfg.db_path.display()
            );
        }
        Cmd::Up => {
            migrate::apply_migrations(&pool).await?;
            println!("schema up to date ({})", store_cfg.db_path.display());
        }
    }

    Ok(())
}
