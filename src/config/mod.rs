pub mod cli;
pub mod env;
pub mod toml_config;

pub use toml_config::EtlConfig;

use crate::utils::error::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "arousa-etl")]
#[command(about = "ETL pipelines for the Ría de Arousa estuary observing system")]
pub struct Cli {
    /// Configuration file (TOML). Falls back to ./arousa.toml, then to
    /// built-in defaults.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log process CPU/memory usage per phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize the environment (.env, overrides) and validate the configuration
    Init,
    /// Gauge-station metadata for the contributing basins
    Stations(StationsArgs),
    /// Bulk-download daily precipitation grids from the THREDDS server
    Download(DownloadArgs),
    /// Unify CTD campaign profiles into one consolidated dataset
    Ctd,
    /// Unify continuous mooring records into one consolidated dataset
    Mooring,
    /// Create the relational schema in PostgreSQL
    Schema,
    /// Filter the river network to the contributing basins
    Rivers,
    /// Report station coverage of the filtered river network
    Coverage,
}

#[derive(Debug, Args)]
pub struct StationsArgs {
    #[command(subcommand)]
    pub command: StationsCommand,
}

#[derive(Debug, Subcommand)]
pub enum StationsCommand {
    /// Download the live station list and filter it to the Arousa basin
    Fetch,
    /// Write the hand-curated station list (offline fallback)
    Seed,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// First date to fetch (overrides the configured start)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,

    /// Last date to fetch (overrides the configured end)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<NaiveDate>,
}

/// Resolves the effective configuration: explicit `--config` path first,
/// then `./arousa.toml` when present, otherwise built-in defaults.
pub fn load_config(path: &Option<PathBuf>) -> Result<EtlConfig> {
    match path {
        Some(explicit) => EtlConfig::from_file(explicit),
        None => {
            let default_path = PathBuf::from("arousa.toml");
            if default_path.exists() {
                EtlConfig::from_file(&default_path)
            } else {
                Ok(EtlConfig::default())
            }
        }
    }
}
