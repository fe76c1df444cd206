//! Canonical object identifiers.
//!
//! Every catalog entity is keyed by an OID of the form
//!
//! ```text
//! oid:ws:<country>:<region>:<type>:<short id>
//! ```
//!
//! `country` is the lower-case ISO 3166 alpha-2 code, `region` the
//! lower-case top-level subdivision of that country (`xx` when unknown),
//! `type` the lower-case feature type from the data source, and the short
//! id is the source identifier with any leading URL parts removed. Only the
//! short id keeps its original case.
//!
//! Because the components are ordered from coarse to fine, the
//! `oid:ws:<country>:<region>:` prefix is a ready-made partition key.
//!
//! Cuyahoga County, Ohio is `oid:ws:us:oh:county:OHC035`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Leading components shared by every OID.
pub const OID_PREFIX: &str = "oid:ws:";

/// Region used when an entity's subdivision cannot be determined.
pub const UNKNOWN_REGION: &str = "xx";

/// Errors produced while assigning or parsing OIDs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OidError {
    /// The entity's metadata has no usable feature type.
    #[error("Cannot get OID: cannot determine feature type for {id}")]
    MissingFeatureType {
        /// Short id of the offending record.
        id: String,
    },

    /// The entity already carries an OID.
    #[error("OID already assigned: {oid}")]
    AlreadyAssigned {
        /// The existing OID.
        oid: String,
    },

    /// The text is not a well-formed OID.
    #[error("Malformed OID '{value}': {reason}")]
    Malformed {
        /// The rejected text.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// A parsed, canonical OID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(String);

impl Oid {
    /// Builds an OID from its components, lower-casing all but the short id.
    #[must_use]
    pub fn new(country: &str, region: &str, feature_type: &str, short_id: &str) -> Self {
        Self(format!(
            "{OID_PREFIX}{}:{}:{}:{short_id}",
            country.to_lowercase(),
            region.to_lowercase(),
            feature_type.to_lowercase(),
        ))
    }

    /// Parses OID text, checking the prefix and that all components are
    /// present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`OidError::Malformed`] if the text does not follow the
    /// `oid:ws:<country>:<region>:<type>:<id>` shape.
    pub fn parse(value: &str) -> Result<Self, OidError> {
        let malformed = |reason| OidError::Malformed {
            value: value.to_string(),
            reason,
        };

        let rest = value
            .strip_prefix(OID_PREFIX)
            .ok_or_else(|| malformed("missing oid:ws: prefix"))?;

        let parts: Vec<&str> = rest.splitn(4, ':').collect();
        if parts.len() != 4 {
            return Err(malformed("expected country, region, type and id"));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(malformed("empty component"));
        }
        if parts[..3].iter().any(|p| p.chars().any(char::is_uppercase)) {
            return Err(malformed("country, region and type must be lower case"));
        }

        Ok(Self(value.to_string()))
    }

    /// Returns the OID text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn component(&self, index: usize) -> &str {
        self.0[OID_PREFIX.len()..]
            .splitn(4, ':')
            .nth(index)
            .unwrap_or_default()
    }

    /// Country component (e.g. `us`).
    #[must_use]
    pub fn country(&self) -> &str {
        self.component(0)
    }

    /// Region component (e.g. `oh`).
    #[must_use]
    pub fn region(&self) -> &str {
        self.component(1)
    }

    /// Feature type component (e.g. `county`).
    #[must_use]
    pub fn feature_type(&self) -> &str {
        self.component(2)
    }

    /// Short id component (e.g. `OHC035`).
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.component(3)
    }

    /// The `oid:ws:<country>:<region>:` partition key of this OID.
    #[must_use]
    pub fn bucket_key(&self) -> String {
        Self::bucket_key_for(self.country(), self.region())
    }

    /// Builds the partition key for a country/region pair.
    #[must_use]
    pub fn bucket_key_for(country: &str, region: &str) -> String {
        format!(
            "{OID_PREFIX}{}:{}:",
            country.to_lowercase(),
            region.to_lowercase()
        )
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Oid {
    type Err = OidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Strips leading URL parts from a source identifier.
///
/// URL-shaped ids (`scheme://authority/path`) reduce to their final path
/// segment, ignoring query, fragment and trailing slashes. Anything else,
/// or a URL with no path segment, is returned verbatim.
#[must_use]
pub fn short_id(raw: &str) -> &str {
    let Some(scheme_end) = raw.find("://") else {
        return raw;
    };

    let after_scheme = &raw[scheme_end + 3..];
    let Some(path_start) = after_scheme.find('/') else {
        return raw;
    };

    let path = &after_scheme[path_start..];
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_end_matches('/');

    match path.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment,
        _ => raw,
    }
}

/// Metadata key holding the subdivision for a country, if that country's
/// regions are resolvable at all.
#[must_use]
pub fn region_metadata_key(country: &str) -> Option<&'static str> {
    match country.to_lowercase().as_str() {
        "us" => Some("state"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_ids_reduce_to_last_segment() {
        assert_eq!(short_id("https://example.com/zones/OHC035"), "OHC035");
        assert_eq!(
            short_id("https://api.weather.gov/zones/county/OHC035/"),
            "OHC035"
        );
        assert_eq!(short_id("https://example.com/zones/OHZ011?x=1#top"), "OHZ011");
    }

    #[test]
    fn plain_ids_are_verbatim() {
        assert_eq!(short_id("OHC035"), "OHC035");
        assert_eq!(short_id("https://example.com"), "https://example.com");
        assert_eq!(short_id(""), "");
    }

    #[test]
    fn new_lowercases_all_but_id() {
        let oid = Oid::new("US", "OH", "County", "OHC035");
        assert_eq!(oid.as_str(), "oid:ws:us:oh:county:OHC035");
        assert_eq!(oid.country(), "us");
        assert_eq!(oid.region(), "oh");
        assert_eq!(oid.feature_type(), "county");
        assert_eq!(oid.short_id(), "OHC035");
        assert_eq!(oid.bucket_key(), "oid:ws:us:oh:");
    }

    #[test]
    fn bucket_key_for_matches_oid_prefix() {
        let oid = Oid::new("us", "la", "county", "LAC071");
        assert_eq!(Oid::bucket_key_for("US", "LA"), oid.bucket_key());
        assert!(oid.as_str().starts_with(&oid.bucket_key()));
    }

    #[test]
    fn parse_roundtrips_and_rejects_garbage() {
        let oid = Oid::parse("oid:ws:us:oh:county:OHC035").unwrap();
        assert_eq!(oid, Oid::new("us", "oh", "county", "OHC035"));

        assert!(Oid::parse("oid:xx:us:oh:county:OHC035").is_err());
        assert!(Oid::parse("oid:ws:us:oh:county").is_err());
        assert!(Oid::parse("oid:ws:us::county:OHC035").is_err());
        assert!(Oid::parse("oid:ws:US:oh:county:OHC035").is_err());
    }

    #[test]
    fn short_id_may_contain_colons() {
        let oid = Oid::parse("oid:ws:us:xx:fire:a:b").unwrap();
        assert_eq!(oid.short_id(), "a:b");
    }

    #[test]
    fn serde_as_plain_string() {
        let oid = Oid::new("us", "gu", "county", "GUC010");
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, "\"oid:ws:us:gu:county:GUC010\"");
        let back: Oid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, oid);
    }
}
