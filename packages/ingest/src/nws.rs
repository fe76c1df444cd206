//! National Weather Service zone features.
//!
//! `all.json` is a JSON array of `GeoJSON` features covering counties and
//! public, fire, coastal and offshore forecast zones. Feature properties are
//! kept verbatim as zone metadata; `name` and `type` default to `""` and
//! `"public"`.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use geojson::Feature;
use geojson::feature::Id;
use zone_catalog_geometry::Geometry;
use zone_catalog_models::{Metadata, Zone};

use crate::{COUNTRY, IngestError};

const STAGE: &str = "nws zones";

/// Zone type used when a feature has none.
pub const DEFAULT_ZONE_TYPE: &str = "public";

/// Directory holding the NWS zone files.
#[must_use]
pub fn zones_dir(root: &Path) -> PathBuf {
    root.join("us").join("nws_zone_geojson")
}

/// Path of the NWS zone feature array.
#[must_use]
pub fn zones_path(root: &Path) -> PathBuf {
    zones_dir(root).join("all.json")
}

fn feature_id(feature: &Feature) -> Option<String> {
    match &feature.id {
        Some(Id::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Id::Number(n)) => Some(n.to_string()),
        _ => feature
            .property("id")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}

fn string_property<'a>(feature: &'a Feature, key: &str, default: &'a str) -> &'a str {
    feature
        .property(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or(default)
}

/// Converts one feature into a zone with its OID assigned.
///
/// # Errors
///
/// Returns [`IngestError::Record`] if the feature has no id, its geometry
/// is unsupported, or no OID can be assigned.
pub fn zone_from_feature(index: usize, feature: Feature) -> Result<Zone, IngestError> {
    let id = feature_id(&feature)
        .ok_or_else(|| IngestError::record(STAGE, format!("#{index}"), "feature has no id"))?;

    let name = string_property(&feature, "name", "").to_string();
    let zone_type = string_property(&feature, "type", DEFAULT_ZONE_TYPE).to_string();

    let geometry = feature
        .geometry
        .map(Geometry::from_geojson)
        .transpose()
        .map_err(|e| IngestError::record(STAGE, id.as_str(), e))?;

    let metadata = feature.properties.map(Metadata::from).unwrap_or_default();

    let mut zone = Zone::new(id, name, zone_type, metadata, geometry);
    let assigned = zone.assign_oid(COUNTRY).map(|_| ());
    if let Err(e) = assigned {
        return Err(IngestError::record(STAGE, zone.id, e));
    }

    Ok(zone)
}

/// Reads every zone from `all.json`, in file order.
///
/// # Errors
///
/// * [`IngestError::Io`] / [`IngestError::Json`] if the file cannot be read.
/// * [`IngestError::Record`] for a feature that cannot become a zone.
/// * [`IngestError::DuplicateOid`] if two features map to the same OID.
pub fn read_zones(path: &Path) -> Result<Vec<Zone>, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
    let features: Vec<Feature> =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| IngestError::Json {
            path: path.display().to_string(),
            source: e,
        })?;

    log::info!("Read {} NWS features from {}", features.len(), path.display());

    let mut seen = BTreeSet::new();
    let mut zones = Vec::with_capacity(features.len());
    let mut invalid = 0usize;

    for (index, feature) in features.into_iter().enumerate() {
        let zone = zone_from_feature(index, feature)?;

        let Some(oid) = zone.oid() else {
            continue;
        };
        if !seen.insert(oid.clone()) {
            return Err(IngestError::DuplicateOid {
                oid: oid.to_string(),
                record: zone.id,
            });
        }

        if let Some(Err(e)) = zone.geometry.as_ref().map(Geometry::validate) {
            log::debug!("{oid}: {e}");
            invalid += 1;
        }

        zones.push(zone);
    }

    if invalid > 0 {
        log::warn!("{invalid} zones have invalid boundaries; add manual fixes for them");
    }

    Ok(zones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TempDir;

    const FEATURES: &str = r#"[
        {
            "type": "Feature",
            "id": "https://api.weather.gov/zones/county/OHC035",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-82.0, 41.0], [-81.0, 41.0], [-81.0, 42.0], [-82.0, 42.0], [-82.0, 41.0]]]
            },
            "properties": {"id": "OHC035", "name": "Cuyahoga", "type": "county", "state": "OH"}
        },
        {
            "type": "Feature",
            "id": "https://api.weather.gov/zones/offshore/ANZ800",
            "geometry": null,
            "properties": {"id": "ANZ800", "type": "offshore"}
        }
    ]"#;

    #[test]
    fn reads_zones_in_file_order() {
        let dir = TempDir::new("nws_read");
        let path = dir.write("all.json", FEATURES);

        let zones = read_zones(&path).unwrap();
        assert_eq!(zones.len(), 2);

        let county = &zones[0];
        assert_eq!(county.oid().unwrap().as_str(), "oid:ws:us:oh:county:OHC035");
        assert_eq!(county.name, "Cuyahoga");
        assert!(county.is_county());
        assert_eq!(county.metadata.get_str("state"), Some("OH"));
        let center = county.center.as_ref().and_then(Geometry::as_point).unwrap();
        assert!((center.x() + 81.5).abs() < 1e-9);
        assert!((center.y() - 41.5).abs() < 1e-9);

        let offshore = &zones[1];
        assert_eq!(offshore.oid().unwrap().as_str(), "oid:ws:us:xx:offshore:ANZ800");
        assert_eq!(offshore.name, "");
        assert!(offshore.geometry.is_none());
        assert!(offshore.center.is_none());
    }

    #[test]
    fn missing_type_defaults_display_type_but_fails_oid() {
        let feature: Feature = serde_json::from_str(
            r#"{"type": "Feature", "id": "X1", "geometry": null, "properties": {"name": "No type"}}"#,
        )
        .unwrap();
        let err = zone_from_feature(0, feature).unwrap_err();
        match err {
            IngestError::Record { stage, record, .. } => {
                assert_eq!(stage, STAGE);
                assert_eq!(record, "X1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn id_falls_back_to_properties() {
        let feature: Feature = serde_json::from_str(
            r#"{"type": "Feature", "geometry": null, "properties": {"id": "GUZ001", "type": "public", "state": "GU"}}"#,
        )
        .unwrap();
        let zone = zone_from_feature(0, feature).unwrap();
        assert_eq!(zone.zone_type, "public");
        assert_eq!(zone.oid().unwrap().as_str(), "oid:ws:us:gu:public:GUZ001");
    }

    #[test]
    fn duplicate_oids_abort() {
        let dir = TempDir::new("nws_dup");
        let path = dir.write(
            "all.json",
            r#"[
                {"type": "Feature", "id": "https://a.example/zones/OHC035", "geometry": null, "properties": {"type": "county", "state": "OH"}},
                {"type": "Feature", "id": "https://b.example/other/OHC035", "geometry": null, "properties": {"type": "county", "state": "OH"}}
            ]"#,
        );

        let err = read_zones(&path).unwrap_err();
        assert!(matches!(err, IngestError::DuplicateOid { .. }));
    }

    #[test]
    fn malformed_file_is_a_json_error() {
        let dir = TempDir::new("nws_bad");
        let path = dir.write("all.json", "{not json");
        assert!(matches!(read_zones(&path), Err(IngestError::Json { .. })));

        let missing = dir.path().join("missing.json");
        assert!(matches!(read_zones(&missing), Err(IngestError::Io { .. })));
    }
}
