//! Migrate command - applies or reverts the PostgreSQL schema

use anyhow::{bail, Context};
use clap::Args;
use tracing::info;

use crate::config::{AppConfig, StorageBackend};
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::storage::{
    connect_pool, postgres_config, revert_last_migration, run_membership_migrations,
    PostgresMigrator,
};

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Revert the most recently applied migration
    #[arg(long, conflicts_with = "status")]
    pub revert: bool,

    /// Print the current schema version and exit
    #[arg(long)]
    pub status: bool,
}

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging);

    if config.storage.backend != StorageBackend::Postgres {
        bail!("migrations require storage.backend = postgres");
    }

    let pool = connect_pool(&postgres_config(&config.storage))
        .await
        .context("connecting to PostgreSQL")?;

    if args.status {
        let version = PostgresMigrator::new(pool).current_version().await?;
        match version {
            Some(version) => info!(version, "Schema version"),
            None => info!("No migrations applied"),
        }
        return Ok(());
    }

    if args.revert {
        match revert_last_migration(&pool).await? {
            Some(version) => info!(version, "Reverted migration"),
            None => info!("Nothing to revert"),
        }
        return Ok(());
    }

    let applied = run_membership_migrations(&pool).await?;
    info!(applied, "Migrations complete");

    Ok(())
}
