//! Source provider: candidate rows and related funding entries.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};

use curator_core::{
    config::SourceConfig,
    rows::{attach_funding, collapse_rows, retain_allowed},
    AttributeValue, FundingEntry, Record, RecordId, RecordRow,
};

use crate::error::SourceError;

/// Separator between agency and grant id in a funding relationship.
const FUNDING_SEPARATOR: &str = "|||";

/// Bound on host parameters per `IN (...)` query.
const RID_CHUNK: usize = 500;

/// Read-only provider of catalog rows.
pub trait SourceProvider {
    /// Rows of every candidate record at its latest version.
    fn list_candidate_records(&self) -> Result<Vec<RecordRow>, SourceError>;

    /// Funding entries for the given rids. Rids without funding are absent.
    fn list_related_entries(
        &self,
        rids: &[RecordId],
    ) -> Result<HashMap<RecordId, Vec<FundingEntry>>, SourceError>;
}

/// Collapse a provider's rows into records and attach funding.
///
/// Rows naming attributes outside `allowed` are dropped and reported once.
pub fn load_records(
    provider: &dyn SourceProvider,
    allowed: &[String],
) -> Result<Vec<Record>, SourceError> {
    let rows = provider.list_candidate_records()?;
    let (rows, rejected) = retain_allowed(rows, allowed);
    if !rejected.is_empty() {
        tracing::warn!(
            attributes = ?rejected,
            "dropping attributes not in the source whitelist"
        );
    }
    let mut records = collapse_rows(rows);
    let rids: Vec<RecordId> = records.iter().map(|r| r.rid.clone()).collect();
    let funding = provider.list_related_entries(&rids)?;
    attach_funding(&mut records, funding);
    tracing::info!(records = records.len(), "loaded candidate records");
    Ok(records)
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

const CANDIDATE_ROWS_SQL: &str = "
SELECT r.rid, c.name, c.value, c.version
FROM resource_columns c
JOIN resources r ON c.rid = r.id
JOIN (
    SELECT rid AS id, MAX(version) AS version
    FROM resource_columns
    GROUP BY rid
) latest ON latest.id = c.rid AND latest.version = c.version
WHERE r.cid = ?1 AND r.status = ?2
ORDER BY r.rid, c.name";

/// Catalog database opened read-only.
pub struct SqliteSource {
    conn: Connection,
    collection_id: i64,
    status: String,
    funding_relationship: i64,
}

impl SqliteSource {
    pub fn open(config: &SourceConfig) -> Result<Self, SourceError> {
        let conn = open_read_only(&config.database)?;
        Ok(Self::with_connection(conn, config))
    }

    /// Wrap an existing connection; fixtures use an in-memory database.
    pub fn with_connection(conn: Connection, config: &SourceConfig) -> Self {
        Self {
            conn,
            collection_id: config.collection_id,
            status: config.status.clone(),
            funding_relationship: config.funding_relationship,
        }
    }
}

impl SourceProvider for SqliteSource {
    fn list_candidate_records(&self) -> Result<Vec<RecordRow>, SourceError> {
        let mut stmt = self.conn.prepare(CANDIDATE_ROWS_SQL)?;
        let mut rows = stmt.query(params![self.collection_id, self.status])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let rid = RecordId(row.get::<_, String>(0)?);
            let name: String = row.get(1)?;
            let version: i64 = row.get(3)?;
            let value = match row.get_ref(2)? {
                ValueRef::Null => AttributeValue::Null,
                ValueRef::Integer(i) => AttributeValue::Integer(i),
                ValueRef::Real(r) => AttributeValue::Real(r),
                ValueRef::Text(bytes) => {
                    AttributeValue::Text(String::from_utf8_lossy(bytes).into_owned())
                }
                ValueRef::Blob(_) => {
                    tracing::warn!(rid = %rid, attribute = %name, "skipping binary attribute value");
                    continue;
                }
            };
            out.push(RecordRow {
                rid,
                name,
                value,
                version,
            });
        }
        tracing::debug!(rows = out.len(), "read candidate rows");
        Ok(out)
    }

    fn list_related_entries(
        &self,
        rids: &[RecordId],
    ) -> Result<HashMap<RecordId, Vec<FundingEntry>>, SourceError> {
        let mut funding: HashMap<RecordId, Vec<FundingEntry>> = HashMap::new();
        for chunk in rids.chunks(RID_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT id1, id2 FROM resource_relationships \
                 WHERE reltype_id = {} AND id2 IN ({placeholders})",
                self.funding_relationship
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter().map(|rid| rid.0.as_str())))?;
            while let Some(row) = rows.next()? {
                let encoded: String = row.get(0)?;
                let rid = RecordId(row.get::<_, String>(1)?);
                if let Some(entry) = parse_funding(&encoded) {
                    funding.entry(rid).or_default().push(entry);
                }
            }
        }
        Ok(funding)
    }
}

/// Parse `"<agency>|||<grant>"`. An empty agency yields `None`; an empty
/// grant becomes `grant_id: None`.
pub fn parse_funding(encoded: &str) -> Option<FundingEntry> {
    let (agency, grant) = encoded
        .split_once(FUNDING_SEPARATOR)
        .unwrap_or((encoded, ""));
    let agency = agency.trim();
    if agency.is_empty() {
        return None;
    }
    let grant = grant.trim();
    Some(FundingEntry {
        agency: agency.to_string(),
        grant_id: (!grant.is_empty()).then(|| grant.to_string()),
    })
}

pub(crate) fn open_read_only(path: &Path) -> Result<Connection, SourceError> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funding_with_grant() {
        let entry = parse_funding("NSF|||ABC-123").expect("entry");
        assert_eq!(entry.agency, "NSF");
        assert_eq!(entry.grant_id.as_deref(), Some("ABC-123"));
    }

    #[test]
    fn funding_without_grant() {
        let entry = parse_funding("NIH|||").expect("entry");
        assert_eq!(entry.grant_id, None);
    }

    #[test]
    fn funding_without_separator_is_agency_only() {
        let entry = parse_funding("NOAA").expect("entry");
        assert_eq!(entry.agency, "NOAA");
        assert_eq!(entry.grant_id, None);
    }

    #[test]
    fn funding_with_empty_agency_is_dropped() {
        assert!(parse_funding("|||123").is_none());
    }
}
