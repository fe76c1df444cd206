//! US postal code database.
//!
//! `zip_code_database.csv` has a header row and one row per zip code. Only
//! `STANDARD` codes are kept; PO boxes, unique and military codes have no
//! meaningful location.

use std::path::{Path, PathBuf};

use zone_catalog_geometry::Geometry;
use zone_catalog_models::PostalArea;

use crate::{COUNTRY, IngestError};

const STAGE: &str = "postal codes";

/// Record type of the postal codes that are kept.
pub const STANDARD_TYPE: &str = "STANDARD";

const CODE_COLUMN: usize = 0;
const TYPE_COLUMN: usize = 1;
const NAME_COLUMN: usize = 2;
const STATE_COLUMN: usize = 5;
const LATITUDE_COLUMN: usize = 9;
const LONGITUDE_COLUMN: usize = 10;

/// Path of the postal code CSV.
#[must_use]
pub fn postal_path(root: &Path) -> PathBuf {
    root.join("us").join("zip_code_database.csv")
}

fn column<'a>(record: &'a csv::StringRecord, index: usize, code: &str) -> Result<&'a str, IngestError> {
    record
        .get(index)
        .ok_or_else(|| IngestError::record(STAGE, code, format!("missing column {index}")))
}

fn coordinate(record: &csv::StringRecord, index: usize, code: &str) -> Result<f64, IngestError> {
    let text = column(record, index, code)?;
    text.trim()
        .parse::<f64>()
        .map_err(|e| IngestError::record(STAGE, code, format!("bad coordinate {text:?}: {e}")))
}

/// Converts one CSV row into a postal area, or `None` for non-`STANDARD`
/// rows.
///
/// # Errors
///
/// Returns [`IngestError::Record`] if a required column is missing or a
/// coordinate does not parse.
pub fn postal_area_from_record(record: &csv::StringRecord) -> Result<Option<PostalArea>, IngestError> {
    let code = record.get(CODE_COLUMN).unwrap_or_default();

    if column(record, TYPE_COLUMN, code)? != STANDARD_TYPE {
        return Ok(None);
    }

    let name = column(record, NAME_COLUMN, code)?;
    let state = column(record, STATE_COLUMN, code)?;
    let latitude = coordinate(record, LATITUDE_COLUMN, code)?;
    let longitude = coordinate(record, LONGITUDE_COLUMN, code)?;

    Ok(Some(PostalArea::new(
        code,
        name,
        COUNTRY,
        state,
        Geometry::point(longitude, latitude),
    )))
}

/// Reads every `STANDARD` postal code, in file order.
///
/// # Errors
///
/// * [`IngestError::Csv`] if the file cannot be opened or parsed.
/// * [`IngestError::Record`] for a row with missing or malformed fields.
pub fn read_postal_areas(path: &Path) -> Result<Vec<PostalArea>, IngestError> {
    let csv_error = |e| IngestError::Csv {
        path: path.display().to_string(),
        source: e,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let mut areas = Vec::new();
    let mut skipped = 0u64;

    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        match postal_area_from_record(&record)? {
            Some(area) => areas.push(area),
            None => skipped += 1,
        }
    }

    log::info!(
        "Read {} standard postal codes from {} ({skipped} other codes skipped)",
        areas.len(),
        path.display()
    );

    Ok(areas)
}
