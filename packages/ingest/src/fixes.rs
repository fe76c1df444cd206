//! Hand-corrected zone boundaries.
//!
//! Some published NWS boundaries are not valid polygons. Each
//! `manual-fixes/<short id>.json` file holds a replacement `GeoJSON`
//! geometry for the zones whose OID ends in `:<short id>`.

use std::path::{Path, PathBuf};

use zone_catalog_geometry::Geometry;

use crate::IngestError;
use crate::nws::zones_dir;

const STAGE: &str = "manual fixes";

/// A replacement boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryFix {
    /// Short id of the zones to patch.
    pub short_id: String,
    /// New boundary.
    pub geometry: Geometry,
}

/// Directory holding manual fix files.
#[must_use]
pub fn fixes_dir(root: &Path) -> PathBuf {
    zones_dir(root).join("manual-fixes")
}

/// Reads every fix in `dir`, sorted by short id.
///
/// A missing directory means there is nothing to fix.
///
/// # Errors
///
/// * [`IngestError::Io`] if the directory or a file cannot be read.
/// * [`IngestError::Record`] if a file is not a valid, non-empty geometry.
pub fn read_fixes(dir: &Path) -> Result<Vec<GeometryFix>, IngestError> {
    if !dir.exists() {
        log::debug!("No manual fixes directory at {}", dir.display());
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::io(dir, e))?;

    let mut fixes = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| IngestError::io(dir, e))?.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }

        let Some(short_id) = path.file_stem().and_then(|s| s.to_str()) else {
            log::warn!("Skipping fix file with a non-UTF-8 name: {}", path.display());
            continue;
        };

        let text = std::fs::read_to_string(&path).map_err(|e| IngestError::io(&path, e))?;
        let geometry = Geometry::from_json(Some(&text))
            .map_err(|e| IngestError::record(STAGE, short_id, e))?
            .ok_or_else(|| IngestError::record(STAGE, short_id, "fix file holds no geometry"))?;
        geometry
            .validate()
            .map_err(|e| IngestError::record(STAGE, short_id, e))?;

        fixes.push(GeometryFix {
            short_id: short_id.to_string(),
            geometry,
        });
    }

    fixes.sort_by(|a, b| a.short_id.cmp(&b.short_id));

    Ok(fixes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TempDir;

    const SQUARE: &str = r#"{"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]}"#;
    const BOWTIE: &str = r#"{"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 1.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]]}"#;

    #[test]
    fn reads_json_fixes_sorted() {
        let dir = TempDir::new("fixes_read");
        dir.write("OHZ011.json", SQUARE);
        dir.write("AKZ017.json", SQUARE);
        dir.write("README.md", "not a fix");

        let fixes = read_fixes(dir.path()).unwrap();
        let ids: Vec<&str> = fixes.iter().map(|f| f.short_id.as_str()).collect();
        assert_eq!(ids, vec!["AKZ017", "OHZ011"]);
        assert_eq!(fixes[0].geometry, Geometry::from_json(Some(SQUARE)).unwrap().unwrap());
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = TempDir::new("fixes_missing");
        assert!(read_fixes(&dir.path().join("manual-fixes")).unwrap().is_empty());
    }

    #[test]
    fn invalid_fix_is_rejected() {
        let dir = TempDir::new("fixes_invalid");
        dir.write("OHZ011.json", BOWTIE);
        let err = read_fixes(dir.path()).unwrap_err();
        match err {
            IngestError::Record { record, .. } => assert_eq!(record, "OHZ011"),
            other => panic!("unexpected error: {other}"),
        }

        let empty = TempDir::new("fixes_empty");
        empty.write("OHZ011.json", "null");
        assert!(matches!(
            read_fixes(empty.path()),
            Err(IngestError::Record { .. })
        ));
    }
}
