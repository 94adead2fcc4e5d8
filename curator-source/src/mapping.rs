//! SQLite-backed [`MappingStore`] in the catalog database.
//!
//! The table is bulk-loaded once at open; lookups never touch the database.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use rusqlite::{params, Connection};

use curator_core::{
    mapping::{insert_new, MappingStore},
    ExternalId, MappingError, RecordId,
};

use crate::error::SourceError;
use crate::provider::open_read_only;
use crate::schema::create_mapping;

const MAPPING_TABLE: &str = "resource_to_registry_mapping";

pub struct SqliteMappingStore {
    conn: Mutex<Connection>,
    entries: RwLock<HashMap<RecordId, ExternalId>>,
}

impl SqliteMappingStore {
    /// Open the database at `path`, creating the mapping table if absent.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let conn = Connection::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open the database at `path` without writing to it. A missing mapping
    /// table reads as empty; [`MappingStore::record`] then fails.
    pub fn open_read_only(path: &Path) -> Result<Self, SourceError> {
        let conn = open_read_only(path)?;
        let entries = if has_mapping_table(&conn)? {
            load_all(&conn)?
        } else {
            HashMap::new()
        };
        Ok(Self::from_parts(conn, entries))
    }

    pub fn with_connection(conn: Connection) -> Result<Self, SourceError> {
        create_mapping(&conn)?;
        let entries = load_all(&conn)?;
        Ok(Self::from_parts(conn, entries))
    }

    fn from_parts(conn: Connection, entries: HashMap<RecordId, ExternalId>) -> Self {
        tracing::debug!(count = entries.len(), "loaded registry mappings");
        Self {
            conn: Mutex::new(conn),
            entries: RwLock::new(entries),
        }
    }
}

fn has_mapping_table(conn: &Connection) -> Result<bool, SourceError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![MAPPING_TABLE],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn load_all(conn: &Connection) -> Result<HashMap<RecordId, ExternalId>, SourceError> {
    let mut stmt = conn.prepare("SELECT rid, external_id FROM resource_to_registry_mapping")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            RecordId(row.get::<_, String>(0)?),
            ExternalId(row.get::<_, String>(1)?),
        ))
    })?;
    let mut entries = HashMap::new();
    for row in rows {
        let (rid, id) = row?;
        entries.entry(rid).or_insert(id);
    }
    Ok(entries)
}

impl MappingStore for SqliteMappingStore {
    fn lookup(&self, rid: &RecordId) -> Option<ExternalId> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(rid).cloned()
    }

    fn record(&self, rid: &RecordId, external_id: &ExternalId) -> Result<(), MappingError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        insert_new(&mut entries, rid, external_id)?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let inserted = conn.execute(
            "INSERT INTO resource_to_registry_mapping (rid, external_id) VALUES (?1, ?2)",
            params![rid.0, external_id.0],
        );
        if let Err(err) = inserted {
            entries.remove(rid);
            return Err(MappingError::Backend(err.to_string()));
        }
        Ok(())
    }

    fn entries(&self) -> Vec<(RecordId, ExternalId)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = entries
            .iter()
            .map(|(rid, id)| (rid.clone(), id.clone()))
            .collect();
        out.sort();
        out
    }
}
