//! Registry mapping store: `rid → external_id`.
//!
//! Mappings are append-only. A store is loaded once and answers
//! [`MappingStore::lookup`] from memory; [`MappingStore::record`] persists
//! a new mapping and fails with [`MappingError::DuplicateMapping`] if the rid
//! is already mapped.
//!
//! # File-backed layout
//!
//! ```text
//! <working_dir>/
//!   mappings.yaml       (mode 0600, rewritten atomically on every record)
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{mapping_io, MappingError};
use crate::types::{ExternalId, RecordId};

/// Lookup and append access to the rid → external id association.
///
/// Implementations must be safe to call concurrently for distinct rids.
pub trait MappingStore: Send + Sync {
    /// External id for `rid`, if one was ever recorded.
    fn lookup(&self, rid: &RecordId) -> Option<ExternalId>;

    /// Persist a new mapping. Never overwrites.
    fn record(&self, rid: &RecordId, external_id: &ExternalId) -> Result<(), MappingError>;

    /// Sorted snapshot of every mapping.
    fn entries(&self) -> Vec<(RecordId, ExternalId)>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Non-persistent store; used for tests and previews.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    entries: RwLock<HashMap<RecordId, ExternalId>>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromIterator<(RecordId, ExternalId)> for InMemoryMappingStore {
    fn from_iter<I: IntoIterator<Item = (RecordId, ExternalId)>>(iter: I) -> Self {
        Self {
            entries: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl MappingStore for InMemoryMappingStore {
    fn lookup(&self, rid: &RecordId) -> Option<ExternalId> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(rid).cloned()
    }

    fn record(&self, rid: &RecordId, external_id: &ExternalId) -> Result<(), MappingError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        insert_new(&mut entries, rid, external_id)
    }

    fn entries(&self) -> Vec<(RecordId, ExternalId)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        sorted(&entries)
    }
}

// ---------------------------------------------------------------------------
// File-backed
// ---------------------------------------------------------------------------

/// On-disk mapping payload.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct MappingFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    mappings: BTreeMap<String, String>,
}

/// YAML-backed store at `<working_dir>/mappings.yaml`.
#[derive(Debug)]
pub struct FileMappingStore {
    path: PathBuf,
    entries: RwLock<HashMap<RecordId, ExternalId>>,
}

/// `<working_dir>/mappings.yaml` — pure, no I/O.
pub fn mapping_path_at(working_dir: &Path) -> PathBuf {
    working_dir.join("mappings.yaml")
}

impl FileMappingStore {
    /// Load the store from `path`. A missing file is an empty store.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self, MappingError> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| mapping_io(&path, e))?;
            let file: MappingFile = serde_yaml::from_str(&contents).map_err(|e| {
                MappingError::Parse {
                    path: path.clone(),
                    source: e,
                }
            })?;
            file.mappings
                .into_iter()
                .map(|(rid, id)| (RecordId(rid), ExternalId(id)))
                .collect()
        } else {
            HashMap::new()
        };
        tracing::debug!(path = %path.display(), count = entries.len(), "loaded mapping store");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
    fn save(&self, entries: &HashMap<RecordId, ExternalId>) -> Result<(), MappingError> {
        let file = MappingFile {
            updated_at: Some(Utc::now()),
            mappings: entries
                .iter()
                .map(|(rid, id)| (rid.0.clone(), id.0.clone()))
                .collect(),
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| mapping_io(dir, e))?;
        }
        let yaml = serde_yaml::to_string(&file)?;
        let tmp = self.path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml).map_err(|e| mapping_io(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(mapping_io(&self.path, e));
        }
        Ok(())
    }
}

impl MappingStore for FileMappingStore {
    fn lookup(&self, rid: &RecordId) -> Option<ExternalId> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(rid).cloned()
    }

    fn record(&self, rid: &RecordId, external_id: &ExternalId) -> Result<(), MappingError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        insert_new(&mut entries, rid, external_id)?;
        if let Err(err) = self.save(&entries) {
            entries.remove(rid);
            return Err(err);
        }
        Ok(())
    }

    fn entries(&self) -> Vec<(RecordId, ExternalId)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        sorted(&entries)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Shared duplicate-checked insert. Callers hold the write lock.
pub fn insert_new(
    entries: &mut HashMap<RecordId, ExternalId>,
    rid: &RecordId,
    external_id: &ExternalId,
) -> Result<(), MappingError> {
    if let Some(existing) = entries.get(rid) {
        return Err(MappingError::DuplicateMapping {
            rid: rid.clone(),
            existing: existing.clone(),
        });
    }
    entries.insert(rid.clone(), external_id.clone());
    Ok(())
}

fn sorted(entries: &HashMap<RecordId, ExternalId>) -> Vec<(RecordId, ExternalId)> {
    let mut out: Vec<_> = entries
        .iter()
        .map(|(rid, id)| (rid.clone(), id.clone()))
        .collect();
    out.sort();
    out
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), MappingError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| mapping_io(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), MappingError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
