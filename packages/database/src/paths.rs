#![allow(clippy::module_name_repetitions)]
//! Default locations of the catalog file and source data.
//!
//! Everything lives under the project root's `data/` directory. The CLI
//! accepts overrides for both.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`, falling back to the
/// current directory if the manifest is not nested as expected.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the default source data root (`data/source/`).
#[must_use]
pub fn source_dir() -> PathBuf {
    data_dir().join("source")
}

/// Returns the default catalog `DuckDB` file path.
#[must_use]
pub fn catalog_db_path() -> PathBuf {
    data_dir().join("catalog.duckdb")
}

/// Returns the path of a sidecar file next to `path`, e.g. `catalog.duckdb`
/// with `"etag"` becomes `catalog.duckdb.etag`.
#[must_use]
pub fn sidecar_path(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_live_under_data() {
        assert!(catalog_db_path().starts_with(data_dir()));
        assert!(source_dir().starts_with(data_dir()));
        assert_eq!(
            catalog_db_path().file_name().and_then(|n| n.to_str()),
            Some("catalog.duckdb")
        );
    }

    #[test]
    fn sidecar_appends_extension() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/catalog.duckdb"), "etag"),
            PathBuf::from("/tmp/catalog.duckdb.etag")
        );
        assert_eq!(
            sidecar_path(Path::new("catalog"), "download"),
            PathBuf::from("catalog.download")
        );
    }
}
