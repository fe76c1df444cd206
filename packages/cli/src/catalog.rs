//! Rebuild steps and typeahead search against a local catalog file.

use std::path::Path;
use std::time::Instant;

use duckdb::Connection;
use zone_catalog_cli_utils::{IndicatifProgress, MultiProgress};
use zone_catalog_database::catalog;
use zone_catalog_database::steps::{StepContext, StepRunner, StepStatus};
use zone_catalog_ingest::source_root;

use crate::{CatalogArgs, StepsAction};

const BUILT_AT_KEY: &str = "built_at";

/// Runs one step runner command.
///
/// The source data root is validated before the catalog file is opened, so
/// a bad `--data` never touches the catalog.
pub fn run_steps(
    multi: &MultiProgress,
    action: StepsAction,
    args: &CatalogArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let runner = zone_catalog_ingest::runner()?;
    let db_path = args.db_path();

    match action {
        StepsAction::Status => {
            let conn = zone_catalog_database::open(&db_path)?;
            print_status(&runner, &conn)?;
            return Ok(());
        }
        StepsAction::Version => {
            let conn = zone_catalog_database::open(&db_path)?;
            match runner.version(&conn)? {
                Some(version) => println!("{version}"),
                None => println!("none"),
            }
            return Ok(());
        }
        StepsAction::Up
        | StepsAction::UpByOne
        | StepsAction::Down
        | StepsAction::Redo
        | StepsAction::Reset => {}
    }

    let root = source_root(&args.data_root())?;
    log::info!(
        "Catalog {} from source data {}",
        db_path.display(),
        root.display()
    );

    let progress = IndicatifProgress::records_bar(multi, "Rebuilding catalog");
    let ctx = StepContext::new(root, progress.clone());
    let conn = zone_catalog_database::open(&db_path)?;

    let start = Instant::now();
    let changed: Vec<u32> = match action {
        StepsAction::Up => runner.up(&conn, &ctx)?,
        StepsAction::UpByOne => runner.up_by_one(&conn, &ctx)?.into_iter().collect(),
        StepsAction::Down => runner.down(&conn, &ctx)?.into_iter().collect(),
        StepsAction::Redo => runner.redo(&conn, &ctx)?.into_iter().collect(),
        StepsAction::Reset => runner.reset(&conn, &ctx)?,
        StepsAction::Status | StepsAction::Version => Vec::new(),
    };
    progress.finish_and_clear();

    let elapsed = start.elapsed();
    if changed.is_empty() {
        log::info!("Nothing to do");
    } else {
        log::info!(
            "{action:?} complete: steps {changed:?} in {:.1}s",
            elapsed.as_secs_f64()
        );
    }

    let status = runner.status(&conn)?;
    if !status.is_empty() && status.iter().all(StepStatus::is_applied) {
        catalog::set_meta(&conn, BUILT_AT_KEY, &chrono::Utc::now().to_rfc3339())?;
        log::info!("Catalog: {}", catalog::counts(&conn)?);
    }

    Ok(())
}

fn print_status(runner: &StepRunner, conn: &Connection) -> Result<(), Box<dyn std::error::Error>> {
    for status in runner.status(conn)? {
        println!("{status}");
    }

    // The schema exists once the first step is applied.
    if runner.version(conn)?.is_some() {
        if let Some(built_at) = catalog::get_meta(conn, BUILT_AT_KEY)? {
            println!();
            println!("Built at {built_at}");
        }
        println!("{}", catalog::counts(conn)?);
    }

    Ok(())
}

/// Prints typeahead matches for `text`.
pub fn search(
    db_path: &Path,
    text: &str,
    region: Option<&str>,
    limit: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    if !db_path.exists() {
        return Err(format!(
            "catalog {} does not exist; run `zone_catalog build` first",
            db_path.display()
        )
        .into());
    }

    let conn = zone_catalog_database::open(db_path)?;
    let entries = catalog::typeahead_search(&conn, text, region, limit)?;

    if entries.is_empty() {
        println!("No matches for {text:?}");
        return Ok(());
    }

    for entry in &entries {
        let oid = entry
            .oid
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!("{:<60} {:<4} {oid}", entry.display, entry.region_code);
    }

    Ok(())
}
