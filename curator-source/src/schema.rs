//! Catalog and mapping table layout.

use rusqlite::Connection;

/// Catalog tables read by [`SqliteSource`](crate::SqliteSource).
pub const CATALOG_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS resources (
    id      INTEGER PRIMARY KEY,
    rid     TEXT NOT NULL,
    cid     INTEGER NOT NULL,
    status  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS resource_columns (
    rid     INTEGER NOT NULL REFERENCES resources(id),
    name    TEXT NOT NULL,
    value,
    version INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS resource_relationships (
    id1        TEXT NOT NULL,
    id2        TEXT NOT NULL,
    reltype_id INTEGER NOT NULL
);
";

/// Mapping table owned by [`SqliteMappingStore`](crate::SqliteMappingStore).
pub const MAPPING_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS resource_to_registry_mapping (
    rid         TEXT PRIMARY KEY,
    external_id TEXT NOT NULL
);
";

/// Create the catalog tables if absent. Used by fixtures and fresh installs.
pub fn create_catalog(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CATALOG_SCHEMA)
}

/// Create the mapping table if absent.
pub fn create_mapping(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(MAPPING_SCHEMA)
}
