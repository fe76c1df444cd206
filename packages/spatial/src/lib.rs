#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Containment join of postal areas against county zones.
//!
//! County polygons are partitioned by the `oid:ws:<country>:<region>:`
//! prefix of their OID, so each postal point is only tested against the
//! zones of its own region. Inside a bucket an R-tree narrows the candidates
//! to those whose bounding box covers the point before the (comparatively
//! expensive) polygon test runs.
//!
//! Overlapping zones are resolved by source order: the zone that was added
//! to the bucket first wins, regardless of area.

use std::collections::BTreeMap;

use geo::{BoundingRect as _, Intersects as _, Point};
use rstar::{AABB, RTree, RTreeObject};
use zone_catalog_geometry::{Geometry, Shape};
use zone_catalog_models::{Oid, PostalArea, Zone};

/// A zone polygon stored in a bucket's R-tree.
struct Candidate {
    /// Position of the zone in source order.
    ordinal: usize,
    oid: Oid,
    envelope: AABB<[f64; 2]>,
    shape: Shape,
}

impl RTreeObject for Candidate {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// County zones partitioned by region.
///
/// Built once per join from the zones of the current rebuild and dropped
/// afterwards; nothing is cached between runs.
pub struct RegionBuckets {
    buckets: BTreeMap<String, RTree<Candidate>>,
    zone_count: usize,
}

impl RegionBuckets {
    /// Buckets every county zone that has an OID and a boundary, keeping the
    /// iteration order as the tie-break order.
    #[must_use]
    pub fn build<'a>(zones: impl IntoIterator<Item = &'a Zone>) -> Self {
        Self::from_entries(zones.into_iter().filter(|z| z.is_county()).filter_map(|z| {
            let oid = z.oid()?.clone();
            let geometry = z.geometry.clone()?;
            Some((oid, geometry))
        }))
    }

    /// Buckets `(oid, boundary)` pairs in iteration order.
    ///
    /// Shapes without a bounding box (empty geometries) are skipped since
    /// they cannot contain anything.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (Oid, Geometry)>) -> Self {
        let mut grouped: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        let mut zone_count = 0;

        for (ordinal, (oid, geometry)) in entries.into_iter().enumerate() {
            let shape = geometry.into_shape();
            let Some(envelope) = compute_envelope(&shape) else {
                log::warn!("Zone {oid} has an empty boundary, leaving it out of the join");
                continue;
            };

            zone_count += 1;
            grouped.entry(oid.bucket_key()).or_default().push(Candidate {
                ordinal,
                oid,
                envelope,
                shape,
            });
        }

        let buckets = grouped
            .into_iter()
            .map(|(key, candidates)| (key, RTree::bulk_load(candidates)))
            .collect::<BTreeMap<_, _>>();

        log::info!(
            "Bucketed {zone_count} zones into {} regions",
            buckets.len()
        );

        Self {
            buckets,
            zone_count,
        }
    }

    /// Number of zones across all buckets.
    #[must_use]
    pub const fn zone_count(&self) -> usize {
        self.zone_count
    }

    /// Number of region buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Whether a bucket exists for the key.
    #[must_use]
    pub fn has_bucket(&self, bucket_key: &str) -> bool {
        self.buckets.contains_key(&bucket_key.to_lowercase())
    }

    /// Finds the first zone (in source order) of the bucket whose boundary
    /// contains the point.
    ///
    /// Points on a boundary count as contained. Returns `None` when the
    /// bucket does not exist or nothing contains the point.
    #[must_use]
    pub fn lookup(&self, bucket_key: &str, point: &Point<f64>) -> Option<&Oid> {
        if !point.x().is_finite() || !point.y().is_finite() {
            return None;
        }

        let tree = self.buckets.get(&bucket_key.to_lowercase())?;
        let query_env = AABB::from_point([point.x(), point.y()]);

        tree.locate_in_envelope_intersecting(&query_env)
            .filter(|candidate| shape_contains(&candidate.shape, point))
            .min_by_key(|candidate| candidate.ordinal)
            .map(|candidate| &candidate.oid)
    }
}

/// Outcome counts of a join run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JoinStats {
    /// Postal areas that received an enclosing zone.
    pub matched: u64,
    /// Postal areas whose region had zones but none contained the point.
    pub unmatched: u64,
    /// Postal areas whose region had no zones at all.
    pub no_bucket: u64,
}

impl JoinStats {
    /// Total number of postal areas considered.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.matched + self.unmatched + self.no_bucket
    }
}

impl std::fmt::Display for JoinStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} matched, {} without an enclosing zone, {} in regions without zones",
            self.matched, self.unmatched, self.no_bucket
        )
    }
}

/// Sets `enclosing_zone_oid` on every postal area.
///
/// Areas in regions with no bucket, or whose point falls outside every
/// candidate, are left with `None`. That is a valid outcome, not an error.
pub fn resolve(buckets: &RegionBuckets, areas: &mut [PostalArea]) -> JoinStats {
    let mut stats = JoinStats::default();

    for area in areas.iter_mut() {
        let key = area.bucket_key();
        if !buckets.has_bucket(&key) {
            log::debug!("No zones for {key}, leaving {} unjoined", area.code);
            area.enclosing_zone_oid = None;
            stats.no_bucket += 1;
            continue;
        }

        let found = area
            .center
            .as_point()
            .and_then(|point| buckets.lookup(&key, point))
            .cloned();

        if found.is_some() {
            stats.matched += 1;
        } else {
            log::debug!("No enclosing zone for {} in {key}", area.code);
            stats.unmatched += 1;
        }
        area.enclosing_zone_oid = found;
    }

    log::info!("Spatial join complete: {stats}");
    stats
}

/// Point-in-shape test. Only polygonal shapes can contain a point; every
/// other kind is a non-match.
fn shape_contains(shape: &Shape, point: &Point<f64>) -> bool {
    match shape {
        Shape::Polygon(polygon) => polygon.intersects(point),
        Shape::MultiPolygon(multi) => multi.iter().any(|polygon| polygon.intersects(point)),
        Shape::Point(_)
        | Shape::LineString(_)
        | Shape::MultiPoint(_)
        | Shape::MultiLineString(_) => false,
    }
}

/// Compute the bounding box envelope for a shape.
fn compute_envelope(shape: &Shape) -> Option<AABB<[f64; 2]>> {
    shape
        .to_geo()
        .bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
