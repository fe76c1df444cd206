#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line tool for the zone catalog.
//!
//! Rebuilds the catalog from source data, queries its typeahead index and
//! publishes or fetches the built file. Uses `indicatif-log-bridge` (via
//! [`zone_catalog_cli_utils::init_logger`]) so that log lines and progress
//! bars never fight for the terminal.

mod catalog;
mod remote;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use zone_catalog_database::paths;

#[derive(Parser)]
#[command(name = "zone_catalog", about = "Build, query and sync the zone catalog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run or inspect the versioned rebuild steps
    Steps {
        #[command(subcommand)]
        action: StepsAction,
        #[command(flatten)]
        args: CatalogArgs,
    },
    /// Apply every pending rebuild step (same as `steps up`)
    Build {
        #[command(flatten)]
        args: CatalogArgs,
    },
    /// Upload the catalog file unless the remote copy already matches
    Publish {
        /// Catalog file (default: `data/catalog.duckdb`)
        #[arg(long)]
        db: Option<PathBuf>,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Download the catalog file if the remote copy has changed
    Fetch {
        /// Catalog file (default: `data/catalog.duckdb`)
        #[arg(long)]
        db: Option<PathBuf>,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Search the typeahead index of a built catalog
    Search {
        /// Text to look for (case-insensitive)
        text: String,
        /// Only return entries for this region code (e.g., "LA")
        #[arg(long)]
        region: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value = "10")]
        limit: u32,
        /// Catalog file (default: `data/catalog.duckdb`)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum StepsAction {
    /// Apply all pending steps
    Up,
    /// Apply the next pending step
    UpByOne,
    /// Revert the latest applied step
    Down,
    /// Revert and re-apply the latest applied step
    Redo,
    /// Revert every applied step, newest first
    Reset,
    /// Show which steps are applied
    Status,
    /// Show the highest applied step version
    Version,
}

#[derive(Args)]
struct CatalogArgs {
    /// Catalog file (default: `data/catalog.duckdb`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Source data root (default: `data/source`)
    #[arg(long, global = true)]
    data: Option<PathBuf>,
}

impl CatalogArgs {
    fn db_path(&self) -> PathBuf {
        db_path(self.db.as_ref())
    }

    fn data_root(&self) -> PathBuf {
        self.data.clone().unwrap_or_else(paths::source_dir)
    }
}

#[derive(Args)]
struct RemoteArgs {
    /// Bucket region (overrides `ZONE_CATALOG_S3_REGION`)
    #[arg(long)]
    region: Option<String>,
    /// Bucket name (overrides `ZONE_CATALOG_S3_BUCKET`)
    #[arg(long)]
    bucket: Option<String>,
    /// Object key (overrides `ZONE_CATALOG_S3_KEY`)
    #[arg(long)]
    key: Option<String>,
}

fn db_path(db: Option<&PathBuf>) -> PathBuf {
    db.cloned().unwrap_or_else(paths::catalog_db_path)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = zone_catalog_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Steps { action, args } => catalog::run_steps(&multi, action, &args)?,
        Commands::Build { args } => catalog::run_steps(&multi, StepsAction::Up, &args)?,
        Commands::Publish { db, remote } => {
            remote::publish(&db_path(db.as_ref()), remote).await?;
        }
        Commands::Fetch { db, remote } => {
            remote::fetch(&db_path(db.as_ref()), remote).await?;
        }
        Commands::Search {
            text,
            region,
            limit,
            db,
        } => catalog::search(&db_path(db.as_ref()), &text, region.as_deref(), limit)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn paths_are_accepted_after_the_action() {
        let cli = Cli::try_parse_from([
            "zone_catalog",
            "steps",
            "up-by-one",
            "--db",
            "/tmp/c.duckdb",
            "--data",
            "/tmp/source",
        ])
        .unwrap();

        let Commands::Steps { action, args } = cli.command else {
            panic!("expected steps");
        };
        assert_eq!(action, StepsAction::UpByOne);
        assert_eq!(args.db_path(), PathBuf::from("/tmp/c.duckdb"));
        assert_eq!(args.data_root(), PathBuf::from("/tmp/source"));
    }

    #[test]
    fn defaults_come_from_the_data_dir() {
        let cli = Cli::try_parse_from(["zone_catalog", "build"]).unwrap();
        let Commands::Build { args } = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.db_path(), paths::catalog_db_path());
        assert_eq!(args.data_root(), paths::source_dir());
    }
}
