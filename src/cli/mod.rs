//! Command line entry points
//!
//! - `serve`: HTTP API
//! - `migrate`: apply, revert or inspect PostgreSQL migrations

pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

/// QRCraft Teams - team membership, invitations and seat quotas
#[derive(Parser)]
#[command(name = "qrcraft-teams")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve,

    /// Manage the PostgreSQL schema
    Migrate(migrate::MigrateArgs),
}
