//! Catalog schema and queries.
//!
//! Tables:
//!
//! * `zones`: one row per zone, keyed by OID, with a monotonically
//!   increasing `ordinal` that records source order.
//! * `postal_areas`: one row per postal code with its center point and the
//!   OID of the enclosing county (nullable).
//! * `typeahead`: display strings for search-as-you-type.
//! * `_meta`: key/value build information.

use duckdb::{Connection, Row};
use zone_catalog_geometry::Geometry;
use zone_catalog_models::{Metadata, Oid, PostalArea, TypeaheadEntry, Zone};

use crate::DbError;

/// Creates all catalog tables if they do not exist.
///
/// # Errors
///
/// Returns [`DbError`] if schema creation fails.
pub fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS zones_ordinal_seq START 1;

        CREATE TABLE IF NOT EXISTS zones (
            oid TEXT PRIMARY KEY,
            ordinal BIGINT NOT NULL DEFAULT nextval('zones_ordinal_seq'),
            id TEXT NOT NULL,
            name TEXT NOT NULL,
            zone_type TEXT NOT NULL,
            metadata TEXT NOT NULL,
            center BLOB,
            geometry BLOB
        );

        CREATE TABLE IF NOT EXISTS postal_areas (
            country TEXT NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            region_code TEXT NOT NULL,
            center BLOB NOT NULL,
            enclosing_zone_oid TEXT,
            PRIMARY KEY (country, code)
        );

        CREATE TABLE IF NOT EXISTS typeahead (
            display TEXT NOT NULL,
            region_code TEXT NOT NULL,
            oid TEXT
        );

        CREATE TABLE IF NOT EXISTS _meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    Ok(())
}

/// Drops every catalog table.
///
/// # Errors
///
/// Returns [`DbError`] if a drop fails.
pub fn drop_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS typeahead;
        DROP TABLE IF EXISTS postal_areas;
        DROP TABLE IF EXISTS zones;
        DROP SEQUENCE IF EXISTS zones_ordinal_seq;
        DROP TABLE IF EXISTS _meta;",
    )?;

    Ok(())
}

fn encode_optional(geometry: Option<&Geometry>) -> Result<Option<Vec<u8>>, DbError> {
    Ok(geometry.map(Geometry::encode).transpose()?)
}

/// Inserts a zone. The zone must already have an OID.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] if the zone has no OID, or another
/// [`DbError`] if encoding or the insert fails (including a duplicate OID).
pub fn insert_zone(conn: &Connection, zone: &Zone) -> Result<(), DbError> {
    let oid = zone.oid().ok_or_else(|| DbError::Conversion {
        message: format!("zone {} has no OID", zone.id),
    })?;

    let metadata = serde_json::to_string(&zone.metadata)?;
    let center = encode_optional(zone.center.as_ref())?;
    let geometry = encode_optional(zone.geometry.as_ref())?;

    conn.execute(
        "INSERT INTO zones (oid, id, name, zone_type, metadata, center, geometry)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        duckdb::params![
            oid.as_str(),
            zone.id,
            zone.name,
            zone.zone_type,
            metadata,
            center,
            geometry,
        ],
    )?;

    Ok(())
}

fn zone_from_row(row: &Row<'_>) -> Result<Zone, DbError> {
    let oid: String = row.get(0)?;
    let id: String = row.get(1)?;
    let name: String = row.get(2)?;
    let zone_type: String = row.get(3)?;
    let metadata: String = row.get(4)?;
    let center: Option<Vec<u8>> = row.get(5)?;
    let geometry: Option<Vec<u8>> = row.get(6)?;

    let metadata: Metadata = serde_json::from_str(&metadata)?;

    Ok(Zone::with_oid(
        Oid::parse(&oid)?,
        id,
        name,
        zone_type,
        metadata,
        Geometry::decode(center.as_deref())?,
        Geometry::decode(geometry.as_deref())?,
    ))
}

/// Loads all zones of a type in source order.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value cannot be
/// decoded.
pub fn load_zones_by_type(conn: &Connection, zone_type: &str) -> Result<Vec<Zone>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT oid, id, name, zone_type, metadata, center, geometry
         FROM zones
         WHERE lower(zone_type) = lower(?)
         ORDER BY ordinal",
    )?;

    let mut rows = stmt.query([zone_type])?;
    let mut zones = Vec::new();
    while let Some(row) = rows.next()? {
        zones.push(zone_from_row(row)?);
    }

    Ok(zones)
}

/// Replaces the boundary and center of every zone whose OID ends with
/// `:<short_id>`.
///
/// Returns the number of zones updated.
///
/// # Errors
///
/// Returns [`DbError`] if encoding or the update fails.
pub fn replace_zone_geometry(
    conn: &Connection,
    short_id: &str,
    geometry: &Geometry,
) -> Result<usize, DbError> {
    let center = encode_optional(geometry.centroid().as_ref())?;
    let boundary = geometry.encode()?;

    let updated = conn.execute(
        "UPDATE zones SET geometry = ?, center = ? WHERE ends_with(oid, ?)",
        duckdb::params![boundary, center, format!(":{short_id}")],
    )?;

    Ok(updated)
}

/// Deletes every zone.
///
/// # Errors
///
/// Returns [`DbError`] if the delete fails.
pub fn clear_zones(conn: &Connection) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM zones", [])?)
}

/// Inserts a postal area.
///
/// # Errors
///
/// Returns [`DbError`] if encoding or the insert fails.
pub fn insert_postal_area(conn: &Connection, area: &PostalArea) -> Result<(), DbError> {
    let center = area.center.encode()?;

    conn.execute(
        "INSERT INTO postal_areas (country, code, name, region_code, center, enclosing_zone_oid)
         VALUES (?, ?, ?, ?, ?, ?)",
        duckdb::params![
            area.country,
            area.code,
            area.name,
            area.region_code,
            center,
            area.enclosing_zone_oid.as_ref().map(Oid::as_str),
        ],
    )?;

    Ok(())
}

/// Loads all postal areas ordered by country and code.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value cannot be
/// decoded.
pub fn load_postal_areas(conn: &Connection) -> Result<Vec<PostalArea>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT country, code, name, region_code, center, enclosing_zone_oid
         FROM postal_areas
         ORDER BY country, code",
    )?;

    let mut rows = stmt.query([])?;
    let mut areas = Vec::new();
    while let Some(row) = rows.next()? {
        let country: String = row.get(0)?;
        let code: String = row.get(1)?;
        let name: String = row.get(2)?;
        let region_code: String = row.get(3)?;
        let center: Vec<u8> = row.get(4)?;
        let enclosing: Option<String> = row.get(5)?;

        let center = Geometry::decode(&center)?.ok_or_else(|| DbError::Conversion {
            message: format!("postal area {code} has an empty center"),
        })?;

        let mut area = PostalArea::new(code, name, &country, region_code, center);
        area.enclosing_zone_oid = enclosing.as_deref().map(Oid::parse).transpose()?;
        areas.push(area);
    }

    Ok(areas)
}

/// Deletes every postal area.
///
/// # Errors
///
/// Returns [`DbError`] if the delete fails.
pub fn clear_postal_areas(conn: &Connection) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM postal_areas", [])?)
}

/// Inserts a typeahead entry.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub fn insert_typeahead_entry(conn: &Connection, entry: &TypeaheadEntry) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO typeahead (display, region_code, oid) VALUES (?, ?, ?)",
        duckdb::params![
            entry.display,
            entry.region_code,
            entry.oid.as_ref().map(Oid::as_str),
        ],
    )?;

    Ok(())
}

/// Deletes every typeahead entry.
///
/// # Errors
///
/// Returns [`DbError`] if the delete fails.
pub fn clear_typeahead(conn: &Connection) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM typeahead", [])?)
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive search of the typeahead index.
///
/// Entries whose display starts with `text` rank ahead of entries that
/// merely contain it; ties are broken alphabetically. `region` restricts
/// results to one region code.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored OID is malformed.
pub fn typeahead_search(
    conn: &Connection,
    text: &str,
    region: Option<&str>,
    limit: u32,
) -> Result<Vec<TypeaheadEntry>, DbError> {
    let escaped = escape_like(text.trim());
    let contains = format!("%{escaped}%");
    let prefix = format!("{escaped}%");
    let region = region.map(str::to_uppercase);

    let region_filter = if region.is_some() {
        "AND region_code = ?"
    } else {
        ""
    };
    let sql = format!(
        "SELECT display, region_code, oid
         FROM typeahead
         WHERE display ILIKE ? ESCAPE '\\' {region_filter}
         ORDER BY CASE WHEN display ILIKE ? ESCAPE '\\' THEN 0 ELSE 1 END, display
         LIMIT {limit}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut param_idx = 1usize;
    stmt.raw_bind_parameter(param_idx, &contains)?;
    if let Some(region) = &region {
        param_idx += 1;
        stmt.raw_bind_parameter(param_idx, region)?;
    }
    stmt.raw_bind_parameter(param_idx + 1, &prefix)?;
    stmt.raw_execute()?;

    let mut rows = stmt.raw_query();
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        let display: String = row.get(0)?;
        let region_code: String = row.get(1)?;
        let oid: Option<String> = row.get(2)?;
        entries.push(TypeaheadEntry {
            display,
            region_code,
            oid: oid.as_deref().map(Oid::parse).transpose()?,
        });
    }

    Ok(entries)
}

/// Gets a value from the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>, DbError> {
    let mut stmt = conn.prepare("SELECT value FROM _meta WHERE key = ?")?;
    match stmt.query_row([key], |row| row.get(0)) {
        Ok(v) => Ok(Some(v)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::Database(e)),
    }
}

/// Sets a value in the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO _meta (key, value) VALUES (?, ?)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        duckdb::params![key, value],
    )?;
    Ok(())
}

/// Row counts of the catalog tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    /// Zones of every type.
    pub zones: u64,
    /// County zones.
    pub counties: u64,
    /// Postal areas.
    pub postal_areas: u64,
    /// Postal areas with an enclosing county.
    pub joined_postal_areas: u64,
    /// Typeahead entries.
    pub typeahead_entries: u64,
}

impl std::fmt::Display for CatalogCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} zones ({} counties), {} postal areas ({} joined), {} typeahead entries",
            self.zones,
            self.counties,
            self.postal_areas,
            self.joined_postal_areas,
            self.typeahead_entries,
        )
    }
}

fn count(conn: &Connection, sql: &str) -> Result<u64, DbError> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    u64::try_from(n).map_err(|e| DbError::Conversion {
        message: format!("negative row count {n}: {e}"),
    })
}

/// Counts rows in each catalog table.
///
/// # Errors
///
/// Returns [`DbError`] if any count query fails.
pub fn counts(conn: &Connection) -> Result<CatalogCounts, DbError> {
    Ok(CatalogCounts {
        zones: count(conn, "SELECT COUNT(*) FROM zones")?,
        counties: count(
            conn,
            "SELECT COUNT(*) FROM zones WHERE lower(zone_type) = 'county'",
        )?,
        postal_areas: count(conn, "SELECT COUNT(*) FROM postal_areas")?,
        joined_postal_areas: count(
            conn,
            "SELECT COUNT(*) FROM postal_areas WHERE enclosing_zone_oid IS NOT NULL",
        )?,
        typeahead_entries: count(conn, "SELECT COUNT(*) FROM typeahead")?,
    })
}
