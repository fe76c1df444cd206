#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Catalog entity types: zones, postal areas and typeahead entries.
//!
//! Zones are polygon-bearing jurisdictions (counties, forecast zones, fire
//! zones). Postal areas are point entities joined to the county that
//! contains them. Both are keyed by an [`Oid`].

pub mod oid;
pub mod regions;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use zone_catalog_geometry::Geometry;

pub use oid::{Oid, OidError};

/// Feature type of county zones, the only type postal areas join against.
pub const COUNTY_TYPE: &str = "county";

/// Open key/value attributes carried over from the source record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, serde_json::Value>);

impl Metadata {
    /// Creates empty metadata.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns a string value, treating non-strings and empty strings as
    /// absent.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Returns the raw JSON value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Metadata {
    fn from(value: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(value.into_iter().collect())
    }
}

impl FromIterator<(String, serde_json::Value)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An administrative or jurisdictional polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    oid: Option<Oid>,
    /// Raw source identifier, possibly a URL.
    pub id: String,
    /// Display name (e.g. "Cuyahoga").
    pub name: String,
    /// Feature type (county, public, fire, coastal, offshore).
    #[serde(rename = "type")]
    pub zone_type: String,
    /// Source-specific attributes such as `state` and `type`.
    pub metadata: Metadata,
    /// Centroid of [`Self::geometry`].
    pub center: Option<Geometry>,
    /// Boundary.
    pub geometry: Option<Geometry>,
}

impl Zone {
    /// Creates a zone without an OID, deriving the center from the boundary.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        zone_type: impl Into<String>,
        metadata: Metadata,
        geometry: Option<Geometry>,
    ) -> Self {
        let center = geometry.as_ref().and_then(Geometry::centroid);
        Self {
            oid: None,
            id: id.into(),
            name: name.into(),
            zone_type: zone_type.into(),
            metadata,
            center,
            geometry,
        }
    }

    /// Rebuilds a zone that was already assigned an OID (e.g. read back from
    /// storage).
    #[must_use]
    pub fn with_oid(
        oid: Oid,
        id: String,
        name: String,
        zone_type: String,
        metadata: Metadata,
        center: Option<Geometry>,
        geometry: Option<Geometry>,
    ) -> Self {
        Self {
            oid: Some(oid),
            id,
            name,
            zone_type,
            metadata,
            center,
            geometry,
        }
    }

    /// The assigned OID, if any.
    #[must_use]
    pub const fn oid(&self) -> Option<&Oid> {
        self.oid.as_ref()
    }

    /// Assigns the zone's OID for the given country.
    ///
    /// The region comes from the country's region metadata key (`state` for
    /// the US) and defaults to `xx`; the feature type comes from
    /// `metadata["type"]` and is mandatory.
    ///
    /// # Errors
    ///
    /// * [`OidError::MissingFeatureType`] if `metadata["type"]` is absent or
    ///   empty. No OID is set.
    /// * [`OidError::AlreadyAssigned`] if the zone already has an OID.
    pub fn assign_oid(&mut self, country: &str) -> Result<&Oid, OidError> {
        if let Some(existing) = &self.oid {
            return Err(OidError::AlreadyAssigned {
                oid: existing.to_string(),
            });
        }

        let short_id = oid::short_id(&self.id);

        let region = oid::region_metadata_key(country)
            .and_then(|key| self.metadata.get_str(key))
            .unwrap_or(oid::UNKNOWN_REGION);

        let feature_type =
            self.metadata
                .get_str("type")
                .ok_or_else(|| OidError::MissingFeatureType {
                    id: short_id.to_string(),
                })?;

        Ok(&*self
            .oid
            .insert(Oid::new(country, region, feature_type, short_id)))
    }

    /// Whether this zone is a county-level zone.
    #[must_use]
    pub fn is_county(&self) -> bool {
        self.zone_type.eq_ignore_ascii_case(COUNTY_TYPE)
    }
}

/// A postal (zip) code represented by its center point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalArea {
    /// Postal code (e.g. "44106").
    pub code: String,
    /// Primary place name.
    pub name: String,
    /// Lower-case country code.
    pub country: String,
    /// Region code (state) as given by the source.
    pub region_code: String,
    /// Center point.
    pub center: Geometry,
    /// OID of the enclosing county zone, set by the spatial join.
    pub enclosing_zone_oid: Option<Oid>,
}

impl PostalArea {
    /// Creates a postal area that has not been joined yet.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        country: &str,
        region_code: impl Into<String>,
        center: Geometry,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            country: country.to_lowercase(),
            region_code: region_code.into(),
            center,
            enclosing_zone_oid: None,
        }
    }

    /// Partition key of the zones this area may fall inside.
    #[must_use]
    pub fn bucket_key(&self) -> String {
        Oid::bucket_key_for(&self.country, &self.region_code)
    }
}

/// A display string for search-as-you-type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeaheadEntry {
    /// Human-readable text that is matched against user input.
    pub display: String,
    /// Upper-case region code used for filtering.
    pub region_code: String,
    /// OID of the zone the entry resolves to.
    pub oid: Option<Oid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn metadata(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
            .collect()
    }

    #[test]
    fn assigns_oid_from_metadata() {
        let mut zone = Zone::new(
            "https://example.com/zones/OHC035",
            "Cuyahoga",
            "county",
            metadata(&[("state", "OH"), ("type", "county")]),
            None,
        );
        let oid = zone.assign_oid("US").unwrap().clone();
        assert_eq!(oid.as_str(), "oid:ws:us:oh:county:OHC035");
        assert_eq!(zone.oid(), Some(&oid));
    }

    #[test]
    fn assignment_is_deterministic() {
        let build = || {
            let mut zone = Zone::new(
                "OHZ011",
                "Cuyahoga",
                "public",
                metadata(&[("state", "oh"), ("type", "Public")]),
                None,
            );
            zone.assign_oid("us").unwrap().clone()
        };
        assert_eq!(build(), build());
        assert_eq!(build().as_str(), "oid:ws:us:oh:public:OHZ011");
    }

    #[test]
    fn region_defaults_to_xx() {
        let mut zone = Zone::new("ANZ530", "Chesapeake Bay", "coastal", metadata(&[("type", "coastal")]), None);
        assert_eq!(
            zone.assign_oid("us").unwrap().as_str(),
            "oid:ws:us:xx:coastal:ANZ530"
        );

        let mut foreign = Zone::new(
            "X1",
            "Somewhere",
            "county",
            metadata(&[("state", "ON"), ("type", "county")]),
            None,
        );
        assert_eq!(foreign.assign_oid("ca").unwrap().region(), "xx");
    }

    #[test]
    fn missing_type_fails_and_leaves_oid_unset() {
        let mut zone = Zone::new(
            "https://example.com/zones/OHC035",
            "Cuyahoga",
            "county",
            metadata(&[("state", "OH")]),
            None,
        );
        let err = zone.assign_oid("us").unwrap_err();
        assert_eq!(
            err,
            OidError::MissingFeatureType {
                id: "OHC035".to_string()
            }
        );
        assert!(zone.oid().is_none());

        zone.metadata.insert("type", "");
        assert!(zone.assign_oid("us").is_err());
        assert!(zone.oid().is_none());
    }

    #[test]
    fn oid_is_never_recomputed() {
        let mut zone = Zone::new("OHC035", "Cuyahoga", "county", metadata(&[("type", "county")]), None);
        zone.assign_oid("us").unwrap();
        zone.metadata.insert("state", "OH");
        let err = zone.assign_oid("us").unwrap_err();
        assert!(matches!(err, OidError::AlreadyAssigned { .. }));
        assert_eq!(zone.oid().unwrap().region(), "xx");
    }

    #[test]
    fn non_string_metadata_is_ignored() {
        let mut meta = Metadata::new();
        meta.insert("type", 42);
        assert_eq!(meta.get_str("type"), None);
        assert_eq!(meta.get("type"), Some(&serde_json::Value::from(42)));
    }

    #[test]
    fn postal_area_bucket_key() {
        let area = PostalArea::new("70112", "New Orleans", "US", "LA", Geometry::point(-90.07, 29.95));
        assert_eq!(area.bucket_key(), "oid:ws:us:la:");
        assert!(area.enclosing_zone_oid.is_none());
    }

    #[test]
    fn zone_center_is_derived() {
        let square = geo::polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 4.0),
            (x: 0.0, y: 4.0),
            (x: 0.0, y: 0.0),
        ];
        let geometry =
            Geometry::from_shape(Some(zone_catalog_geometry::Shape::Polygon(square)));
        let zone = Zone::new("Z", "Z", "county", Metadata::new(), geometry);
        let center = zone.center.as_ref().and_then(Geometry::as_point).unwrap();
        assert!((center.x() - 2.0).abs() < 1e-9);
        assert!((center.y() - 2.0).abs() < 1e-9);
    }
}
