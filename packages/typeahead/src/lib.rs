#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Typeahead display strings.
//!
//! Produces one entry per county zone and one per postal area:
//!
//! ```text
//! <county><term>, <region>, <country>
//! <place>, <county><term>, <region>, <zip>, <country>
//! ```
//!
//! The postal form needs the name of the enclosing county, so the index is
//! derived only after the spatial join has run. Postal areas the join left
//! without a county drop the county segment entirely.

use std::collections::BTreeMap;

use zone_catalog_models::{Oid, PostalArea, TypeaheadEntry, Zone, regions};

/// Suffix appended to a county name in the given US region.
///
/// Louisiana has parishes, territories have no county-equivalent suffix,
/// everything else has counties.
#[must_use]
pub fn county_term(region: &str) -> &'static str {
    if region.eq_ignore_ascii_case("la") {
        " Parish"
    } else if regions::is_non_state_territory(region) {
        ""
    } else {
        " County"
    }
}

fn region_display(country: &str, region: &str) -> String {
    regions::region_name(country, region).map_or_else(|| region.to_uppercase(), str::to_string)
}

fn country_display(country: &str) -> String {
    regions::country_name(country).map_or_else(|| country.to_uppercase(), str::to_string)
}

/// Display string for a county zone.
#[must_use]
pub fn county_display(name: &str, country: &str, region: &str) -> String {
    format!(
        "{name}{}, {}, {}",
        county_term(region),
        region_display(country, region),
        country_display(country),
    )
}

/// Display string for a postal area, with the county segment omitted when
/// `county_name` is `None`.
#[must_use]
pub fn postal_display(
    name: &str,
    county_name: Option<&str>,
    country: &str,
    region: &str,
    zip: &str,
) -> String {
    let region_name = region_display(country, region);
    let country_name = country_display(country);

    match county_name {
        Some(county) => format!(
            "{name}, {county}{}, {region_name}, {zip}, {country_name}",
            county_term(region)
        ),
        None => format!("{name}, {region_name}, {zip}, {country_name}"),
    }
}

/// Region code of a county zone: `metadata["state"]`, falling back to the
/// region component of its OID.
fn county_region(zone: &Zone, oid: &Oid) -> String {
    zone.metadata
        .get_str("state")
        .unwrap_or_else(|| oid.region())
        .to_uppercase()
}

/// Builds the full index from county zones and joined postal areas.
///
/// Zones that are not counties or have no OID are ignored. Postal entries
/// carry the OID of their enclosing county.
#[must_use]
pub fn build_index<'a>(
    zones: impl IntoIterator<Item = &'a Zone>,
    areas: &[PostalArea],
) -> Vec<TypeaheadEntry> {
    let mut entries = Vec::new();
    let mut county_names: BTreeMap<&Oid, &str> = BTreeMap::new();

    for zone in zones {
        if !zone.is_county() {
            continue;
        }
        let Some(oid) = zone.oid() else {
            log::warn!("County {} has no OID, skipping typeahead entry", zone.id);
            continue;
        };

        let region = county_region(zone, oid);
        entries.push(TypeaheadEntry {
            display: county_display(&zone.name, oid.country(), &region),
            region_code: region,
            oid: Some(oid.clone()),
        });
        county_names.insert(oid, &zone.name);
    }

    let county_count = entries.len();

    for area in areas {
        let county_name = area
            .enclosing_zone_oid
            .as_ref()
            .and_then(|oid| county_names.get(oid).copied());

        if area.enclosing_zone_oid.is_some() && county_name.is_none() {
            log::warn!(
                "Postal area {} references unknown county {:?}",
                area.code,
                area.enclosing_zone_oid
            );
        }

        entries.push(TypeaheadEntry {
            display: postal_display(
                &area.name,
                county_name,
                &area.country,
                &area.region_code,
                &area.code,
            ),
            region_code: area.region_code.to_uppercase(),
            oid: area.enclosing_zone_oid.clone(),
        });
    }

    log::info!(
        "Built {} typeahead entries ({county_count} counties, {} postal areas)",
        entries.len(),
        entries.len() - county_count
    );

    entries
}
