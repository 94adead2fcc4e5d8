//! Per-record local state.
//!
//! ```text
//! <working_dir>/<rid>/
//!   record.json          snapshot of the record; a member of its file set
//!   manifest.txt         last fingerprint accepted by the registry
//!   <external_id>.json   last registry response
//! ```
//!
//! Every write goes to a `.tmp` sibling and is renamed into place.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use curator_core::{AttributeValue, ExternalId, Fingerprint, FundingEntry, Record, RecordId};

use crate::error::{io_err, SyncError};

pub const SNAPSHOT_FILE: &str = "record.json";
pub const MARKER_FILE: &str = "manifest.txt";

/// `<working_dir>/<rid-component>` — pure, no I/O.
pub fn record_dir_at(working_dir: &Path, rid: &RecordId) -> PathBuf {
    working_dir.join(rid.path_component())
}

pub fn marker_path(record_dir: &Path) -> PathBuf {
    record_dir.join(MARKER_FILE)
}

pub fn snapshot_path(record_dir: &Path) -> PathBuf {
    record_dir.join(SNAPSHOT_FILE)
}

pub fn receipt_path(record_dir: &Path, id: &ExternalId) -> PathBuf {
    let component = RecordId(id.0.clone()).path_component();
    record_dir.join(format!("{component}.json"))
}

// ---------------------------------------------------------------------------
// Marker
// ---------------------------------------------------------------------------

/// Last fingerprint accepted by the registry, or `None` if never written.
pub fn read_marker(record_dir: &Path) -> Result<Option<Fingerprint>, SyncError> {
    let path = marker_path(record_dir);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let line = contents.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(Fingerprint(line.to_string())))
}

pub fn write_marker(record_dir: &Path, fingerprint: &Fingerprint) -> Result<(), SyncError> {
    write_atomic(&marker_path(record_dir), format!("{fingerprint}\n").as_bytes())
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Serialized form of `record.json`. The version is left out so the file
/// changes only when content does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordSnapshot {
    pub rid: RecordId,
    pub fingerprint: Fingerprint,
    pub attributes: std::collections::BTreeMap<String, AttributeValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub funding: Vec<FundingEntry>,
}

impl RecordSnapshot {
    pub fn new(record: &Record, fingerprint: &Fingerprint) -> Self {
        let mut funding = record.funding.clone();
        funding.sort();
        Self {
            rid: record.rid.clone(),
            fingerprint: fingerprint.clone(),
            attributes: record.attributes.clone(),
            funding,
        }
    }

    /// Pretty JSON with a trailing newline; the exact bytes that get digested.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

pub fn write_snapshot(record_dir: &Path, bytes: &[u8]) -> Result<PathBuf, SyncError> {
    let path = snapshot_path(record_dir);
    write_atomic(&path, bytes)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ReceiptFile<'a> {
    saved_at: DateTime<Utc>,
    response: &'a serde_json::Value,
}

pub fn write_receipt(
    record_dir: &Path,
    id: &ExternalId,
    response: &serde_json::Value,
) -> Result<PathBuf, SyncError> {
    let path = receipt_path(record_dir, id);
    let json = serde_json::to_vec_pretty(&ReceiptFile {
        saved_at: Utc::now(),
        response,
    })?;
    write_atomic(&path, &json)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("path has no parent")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
