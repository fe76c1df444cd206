#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rebuilds the zone catalog from raw source data.
//!
//! The source data root is laid out as:
//!
//! ```text
//! us/nws_zone_geojson/all.json                 NWS zone features
//! us/nws_zone_geojson/manual-fixes/<id>.json   replacement boundaries
//! us/zip_code_database.csv                     postal codes
//! ```
//!
//! [`steps::all_steps`] lists the rebuild steps in order; hand them to a
//! [`StepRunner`] together with a [`StepContext`] built from
//! [`source_root`].

pub mod fixes;
pub mod nws;
pub mod postal;
pub mod steps;

use std::path::{Path, PathBuf};

use zone_catalog_database::DbError;
use zone_catalog_database::steps::{CatalogStep, StepRunner};

pub use zone_catalog_database::progress::{NullProgress, ProgressCallback, null_progress};
pub use zone_catalog_database::steps::StepContext;

/// Country every bundled source belongs to.
pub const COUNTRY: &str = "us";

/// Errors that can occur while reading source data or running a step.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The source data root or another setting is unusable.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of what went wrong.
        message: String,
    },

    /// I/O error reading a source file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV parsing error.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// JSON parsing error.
    #[error("JSON error in {path}: {source}")]
    Json {
        /// Path to the JSON file.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A single source record could not be turned into a catalog entity.
    #[error("{stage}: bad record {record}: {source}")]
    Record {
        /// Stage that was processing the record.
        stage: &'static str,
        /// Identifier of the record (id, code or file name).
        record: String,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Two source records produced the same OID.
    #[error("Duplicate OID {oid} (record {record})")]
    DuplicateOid {
        /// The repeated OID.
        oid: String,
        /// Raw id of the second record.
        record: String,
    },

    /// Storage error.
    #[error(transparent)]
    Database(#[from] DbError),
}

impl IngestError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn record(
        stage: &'static str,
        record: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Record {
            stage,
            record: record.into(),
            source: source.into(),
        }
    }

    /// Converts into the error type steps report to the runner.
    ///
    /// Storage errors pass through unchanged; everything else is attributed
    /// to `step`.
    #[must_use]
    pub fn into_step_error(self, step: &dyn CatalogStep) -> DbError {
        match self {
            Self::Database(e) => e,
            other => DbError::Step {
                version: step.version(),
                name: step.name(),
                source: Box::new(other),
            },
        }
    }
}

/// Validates a source data root: it must exist and be a directory.
///
/// Returns the canonical absolute path.
///
/// # Errors
///
/// Returns [`IngestError::Configuration`] naming the path if it does not
/// exist, is not a directory, or cannot be resolved.
pub fn source_root(path: &Path) -> Result<PathBuf, IngestError> {
    let metadata = std::fs::metadata(path).map_err(|e| IngestError::Configuration {
        message: format!("invalid source data root {}: {e}", path.display()),
    })?;

    if !metadata.is_dir() {
        return Err(IngestError::Configuration {
            message: format!(
                "invalid source data root {}: not a directory",
                path.display()
            ),
        });
    }

    std::fs::canonicalize(path).map_err(|e| IngestError::Configuration {
        message: format!("invalid source data root {}: {e}", path.display()),
    })
}

/// Builds a runner over [`steps::all_steps`].
///
/// # Errors
///
/// Returns [`DbError::InvalidSteps`] if the step list is inconsistent.
pub fn runner() -> Result<StepRunner, DbError> {
    StepRunner::new(steps::all_steps())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    /// A scratch directory under the system temp dir, removed on drop.
    pub struct TempDir(PathBuf);

    impl TempDir {
        pub fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "zone_catalog_ingest_{name}_{}",
                std::process::id()
            ));
            let _ = std::fs::remove_dir_all(&path);
            std::fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        pub fn path(&self) -> &Path {
            &self.0
        }

        pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
            let path = self.0.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, contents).unwrap();
            path
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::TempDir;
    use super::*;

    #[test]
    fn source_root_must_be_an_existing_directory() {
        let dir = TempDir::new("root");
        let resolved = source_root(dir.path()).unwrap();
        assert!(resolved.is_absolute());

        let file = dir.write("file.txt", "x");
        let err = source_root(&file).unwrap_err();
        assert!(matches!(err, IngestError::Configuration { .. }));
        assert!(err.to_string().contains("file.txt"));

        let missing = dir.path().join("missing");
        assert!(matches!(
            source_root(&missing),
            Err(IngestError::Configuration { .. })
        ));
    }

    #[test]
    fn default_runner_is_consistent() {
        let runner = runner().unwrap();
        assert_eq!(runner.len(), steps::all_steps().len());
    }
}
