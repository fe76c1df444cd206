//! The rebuild steps, in order.
//!
//! | Version | Step | Down |
//! |---|---|---|
//! | 1 | create catalog schema | drop schema |
//! | 2 | load NWS zones | delete zones |
//! | 3 | apply manual geometry fixes | no-op |
//! | 4 | load postal areas and join them to counties | delete postal areas |
//! | 5 | build typeahead index | delete typeahead entries |
//!
//! Fixes run before the join so that corrected county boundaries are the
//! ones postal codes are matched against.

use duckdb::Connection;
use zone_catalog_database::steps::{CatalogStep, StepContext};
use zone_catalog_database::{DbError, catalog};
use zone_catalog_models::COUNTY_TYPE;
use zone_catalog_spatial::{RegionBuckets, resolve};

use crate::{IngestError, fixes, nws, postal};

/// Every rebuild step, in version order.
#[must_use]
pub fn all_steps() -> Vec<Box<dyn CatalogStep>> {
    vec![
        Box::new(CreateSchema),
        Box::new(LoadZones),
        Box::new(ApplyGeometryFixes),
        Box::new(LoadPostalAreas),
        Box::new(BuildTypeaheadIndex),
    ]
}

/// Creates the catalog tables.
pub struct CreateSchema;

impl CatalogStep for CreateSchema {
    fn version(&self) -> u32 {
        1
    }

    fn name(&self) -> &'static str {
        "create catalog schema"
    }

    fn up(&self, conn: &Connection, _ctx: &StepContext) -> Result<(), DbError> {
        catalog::create_schema(conn)
    }

    fn down(&self, conn: &Connection, _ctx: &StepContext) -> Result<(), DbError> {
        catalog::drop_schema(conn)
    }
}

/// Loads NWS zones with their OIDs.
pub struct LoadZones;

impl LoadZones {
    fn run(conn: &Connection, ctx: &StepContext) -> Result<(), IngestError> {
        let zones = nws::read_zones(&nws::zones_path(ctx.source_root()))?;

        let progress = ctx.progress();
        progress.set_message("Loading zones".to_string());
        progress.set_total(zones.len() as u64);

        for zone in &zones {
            catalog::insert_zone(conn, zone)?;
            progress.inc(1);
        }

        progress.finish(format!("Loaded {} zones", zones.len()));
        log::info!("Loaded {} zones", zones.len());
        Ok(())
    }
}

impl CatalogStep for LoadZones {
    fn version(&self) -> u32 {
        2
    }

    fn name(&self) -> &'static str {
        "load nws zones"
    }

    fn up(&self, conn: &Connection, ctx: &StepContext) -> Result<(), DbError> {
        Self::run(conn, ctx).map_err(|e| e.into_step_error(self))
    }

    fn down(&self, conn: &Connection, _ctx: &StepContext) -> Result<(), DbError> {
        let deleted = catalog::clear_zones(conn)?;
        log::info!("Deleted {deleted} zones");
        Ok(())
    }
}

/// Replaces invalid zone boundaries with hand-corrected ones.
pub struct ApplyGeometryFixes;

impl ApplyGeometryFixes {
    fn run(conn: &Connection, ctx: &StepContext) -> Result<(), IngestError> {
        let fixes = fixes::read_fixes(&fixes::fixes_dir(ctx.source_root()))?;

        let mut patched = 0usize;
        for fix in &fixes {
            let updated = catalog::replace_zone_geometry(conn, &fix.short_id, &fix.geometry)?;
            if updated == 0 {
                log::warn!("Manual fix {} matches no zone", fix.short_id);
            }
            patched += updated;
        }

        log::info!("Applied {} manual fixes to {patched} zones", fixes.len());
        Ok(())
    }
}

impl CatalogStep for ApplyGeometryFixes {
    fn version(&self) -> u32 {
        3
    }

    fn name(&self) -> &'static str {
        "apply manual geometry fixes"
    }

    fn up(&self, conn: &Connection, ctx: &StepContext) -> Result<(), DbError> {
        Self::run(conn, ctx).map_err(|e| e.into_step_error(self))
    }

    /// The replaced boundaries were invalid, so there is nothing to restore.
    fn down(&self, _conn: &Connection, _ctx: &StepContext) -> Result<(), DbError> {
        Ok(())
    }
}

/// Loads postal areas and assigns each its enclosing county.
pub struct LoadPostalAreas;

impl LoadPostalAreas {
    fn run(conn: &Connection, ctx: &StepContext) -> Result<(), IngestError> {
        let mut areas = postal::read_postal_areas(&postal::postal_path(ctx.source_root()))?;

        let counties = catalog::load_zones_by_type(conn, COUNTY_TYPE)?;
        let buckets = RegionBuckets::build(&counties);
        let stats = resolve(&buckets, &mut areas);
        log::info!("Postal join: {stats}");
        if stats.unmatched + stats.no_bucket > 0 {
            log::warn!(
                "{} postal areas have no enclosing county",
                stats.unmatched + stats.no_bucket
            );
        }

        let progress = ctx.progress();
        progress.set_message("Loading postal areas".to_string());
        progress.set_total(areas.len() as u64);

        for area in &areas {
            catalog::insert_postal_area(conn, area)?;
            progress.inc(1);
        }

        progress.finish(format!("Loaded {} postal areas", areas.len()));
        Ok(())
    }
}

impl CatalogStep for LoadPostalAreas {
    fn version(&self) -> u32 {
        4
    }

    fn name(&self) -> &'static str {
        "load postal areas"
    }

    fn up(&self, conn: &Connection, ctx: &StepContext) -> Result<(), DbError> {
        Self::run(conn, ctx).map_err(|e| e.into_step_error(self))
    }

    fn down(&self, conn: &Connection, _ctx: &StepContext) -> Result<(), DbError> {
        let deleted = catalog::clear_postal_areas(conn)?;
        log::info!("Deleted {deleted} postal areas");
        Ok(())
    }
}

/// Derives the typeahead index from counties and joined postal areas.
pub struct BuildTypeaheadIndex;

impl CatalogStep for BuildTypeaheadIndex {
    fn version(&self) -> u32 {
        5
    }

    fn name(&self) -> &'static str {
        "build typeahead index"
    }

    fn up(&self, conn: &Connection, ctx: &StepContext) -> Result<(), DbError> {
        let counties = catalog::load_zones_by_type(conn, COUNTY_TYPE)?;
        let areas = catalog::load_postal_areas(conn)?;
        let entries = zone_catalog_typeahead::build_index(&counties, &areas);

        let progress = ctx.progress();
        progress.set_message("Building typeahead index".to_string());
        progress.set_total(entries.len() as u64);

        for entry in &entries {
            catalog::insert_typeahead_entry(conn, entry)?;
            progress.inc(1);
        }

        progress.finish(format!("Indexed {} typeahead entries", entries.len()));
        Ok(())
    }

    fn down(&self, conn: &Connection, _ctx: &StepContext) -> Result<(), DbError> {
        let deleted = catalog::clear_typeahead(conn)?;
        log::info!("Deleted {deleted} typeahead entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use zone_catalog_database::catalog::CatalogCounts;

    use super::*;
    use crate::test_support::TempDir;

    const ZONES: &str = r#"[
        {
            "type": "Feature",
            "id": "https://api.weather.gov/zones/county/LAC071",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-91.0, 29.0], [-89.0, 29.0], [-89.0, 31.0], [-91.0, 31.0], [-91.0, 29.0]]]
            },
            "properties": {"name": "Orleans", "type": "county", "state": "LA"}
        },
        {
            "type": "Feature",
            "id": "https://api.weather.gov/zones/county/LAC051",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-92.0, 29.0], [-91.0, 30.0], [-91.0, 29.0], [-92.0, 30.0], [-92.0, 29.0]]]
            },
            "properties": {"name": "Jefferson", "type": "county", "state": "LA"}
        },
        {
            "type": "Feature",
            "id": "https://api.weather.gov/zones/forecast/LAZ061",
            "geometry": null,
            "properties": {"name": "Orleans", "type": "public", "state": "LA"}
        }
    ]"#;

    const JEFFERSON_FIX: &str = r#"{"type": "Polygon", "coordinates": [[[-92.0, 29.0], [-91.0, 29.0], [-91.0, 30.0], [-92.0, 30.0], [-92.0, 29.0]]]}"#;

    const ZIPS: &str = "zip,type,primary_city,acceptable_cities,unacceptable_cities,state,county,timezone,area_codes,latitude,longitude\n\
        70112,STANDARD,New Orleans,,,LA,Orleans Parish,America/Chicago,504,29.95,-90.07\n\
        70072,STANDARD,Marrero,,,LA,Jefferson Parish,America/Chicago,504,29.75,-91.5\n\
        70150,PO BOX,New Orleans,,,LA,Orleans Parish,America/Chicago,504,29.95,-90.07\n\
        96910,STANDARD,Hagatna,,,GU,,Pacific/Guam,671,13.47,144.75\n";

    fn source(name: &str) -> TempDir {
        let dir = TempDir::new(name);
        dir.write("us/nws_zone_geojson/all.json", ZONES);
        dir.write("us/nws_zone_geojson/manual-fixes/LAC051.json", JEFFERSON_FIX);
        dir.write("us/zip_code_database.csv", ZIPS);
        dir
    }

    #[test]
    fn full_rebuild_and_reset() {
        let dir = source("steps_full");
        let ctx = StepContext::without_progress(crate::source_root(dir.path()).unwrap());
        let conn = Connection::open_in_memory().unwrap();
        let runner = crate::runner().unwrap();

        assert_eq!(runner.up(&conn, &ctx).unwrap(), vec![1, 2, 3, 4, 5]);

        assert_eq!(
            catalog::counts(&conn).unwrap(),
            CatalogCounts {
                zones: 3,
                counties: 2,
                postal_areas: 3,
                joined_postal_areas: 2,
                typeahead_entries: 5,
            }
        );

        let areas = catalog::load_postal_areas(&conn).unwrap();
        let marrero = areas.iter().find(|a| a.code == "70072").unwrap();
        assert_eq!(
            marrero.enclosing_zone_oid.as_ref().map(|o| o.as_str()),
            Some("oid:ws:us:la:county:LAC051")
        );
        let hagatna = areas.iter().find(|a| a.code == "96910").unwrap();
        assert!(hagatna.enclosing_zone_oid.is_none());

        let hits = catalog::typeahead_search(&conn, "new orleans", None, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].display,
            "New Orleans, Orleans Parish, Louisiana, 70112, United States"
        );
        let guam = catalog::typeahead_search(&conn, "hagatna", Some("gu"), 10).unwrap();
        assert_eq!(guam[0].display, "Hagatna, Guam, 96910, United States");

        assert_eq!(runner.reset(&conn, &ctx).unwrap(), vec![5, 4, 3, 2, 1]);
        assert_eq!(runner.version(&conn).unwrap(), None);
    }

    #[test]
    fn redo_rebuilds_the_index() {
        let dir = source("steps_redo");
        let ctx = StepContext::without_progress(crate::source_root(dir.path()).unwrap());
        let conn = Connection::open_in_memory().unwrap();
        let runner = crate::runner().unwrap();
        runner.up(&conn, &ctx).unwrap();

        assert_eq!(runner.redo(&conn, &ctx).unwrap(), Some(5));
        assert_eq!(catalog::counts(&conn).unwrap().typeahead_entries, 5);
    }

    #[test]
    fn bad_source_rolls_back_everything() {
        let dir = source("steps_bad");
        dir.write(
            "us/zip_code_database.csv",
            "zip,type,primary_city,a,b,state,c,d,e,latitude,longitude\n44106,STANDARD,Cleveland,,,OH,,,,north,-81.6\n",
        );
        let ctx = StepContext::without_progress(crate::source_root(dir.path()).unwrap());
        let conn = Connection::open_in_memory().unwrap();
        let runner = crate::runner().unwrap();

        let err = runner.up(&conn, &ctx).unwrap_err();
        assert!(matches!(err, DbError::Step { version: 4, .. }));
        assert_eq!(runner.version(&conn).unwrap(), None);
    }
}
