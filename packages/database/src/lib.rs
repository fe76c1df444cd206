#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` storage for the zone catalog.
//!
//! The catalog is a single `DuckDB` file holding zones, postal areas and the
//! typeahead index. Geometries are stored as WKB blobs and metadata as JSON
//! text. The file is rebuilt from scratch by a sequence of versioned steps
//! driven by [`steps::StepRunner`].

pub mod catalog;
pub mod paths;
pub mod progress;
pub mod steps;

use std::path::Path;

use duckdb::Connection;
use zone_catalog_geometry::GeometryError;
use zone_catalog_models::OidError;

/// Errors that can occur during catalog storage operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query error.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored geometry could not be encoded or decoded.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Metadata JSON could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored OID is malformed.
    #[error("OID error: {0}")]
    Oid(#[from] OidError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// The registered step list is inconsistent.
    #[error("Invalid step configuration: {message}")]
    InvalidSteps {
        /// Description of what went wrong.
        message: String,
    },

    /// A rebuild step failed.
    #[error("Step {version} ({name}) failed: {source}")]
    Step {
        /// Version of the failing step.
        version: u32,
        /// Name of the failing step.
        name: &'static str,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Opens (or creates) a catalog database file.
///
/// The schema itself is created by the first rebuild step, not here.
///
/// # Errors
///
/// Returns [`DbError`] if the parent directory or connection cannot be
/// created.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;

    conn.execute_batch("SET threads = 4; SET memory_limit = '512MB';")?;

    Ok(conn)
}

/// Opens the catalog at the default path.
///
/// # Errors
///
/// Returns [`DbError`] if the connection fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&paths::catalog_db_path())
}

/// Runs `f` inside a single transaction, rolling back if it fails.
///
/// # Errors
///
/// Returns the error from `f`, or [`DbError::Database`] if the transaction
/// cannot be started or committed.
pub fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce() -> Result<T, DbError>,
) -> Result<T, DbError> {
    conn.execute_batch("BEGIN TRANSACTION")?;

    match f() {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                log::error!("Rollback failed after error ({e}): {rollback}");
            }
            Err(e)
        }
    }
}
