//! Domain types for catalog reconciliation.
//!
//! All types are serializable/deserializable via serde. `FileEntry` carries the
//! registry's wire field names (`filename`, `hash`, `algorithm`) because the
//! registry document is the only place a manifest is persisted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Internal catalog identifier of a record (`rid`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// The rid as a single, safe path component.
    ///
    /// Characters outside `[A-Za-z0-9._-]` become `_`; `.` and `..` are
    /// rewritten so the component never escapes its parent directory.
    pub fn path_component(&self) -> String {
        let cleaned: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        match cleaned.as_str() {
            "" | "." | ".." => format!("_{cleaned}"),
            _ => cleaned,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque identifier the registry assigned to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalId(pub String);

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ExternalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExternalId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Lowercase hex content checksum of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A scalar attribute value as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl AttributeValue {
    /// Text rendering used when the value feeds a document field.
    /// `Null` renders as `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Integer(i) => Some(i.to_string()),
            AttributeValue::Real(r) => Some(r.to_string()),
            AttributeValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i)
    }
}

/// One `(rid, name, value, version)` row from the catalog source.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    pub rid: RecordId,
    pub name: String,
    pub value: AttributeValue,
    pub version: i64,
}

/// A funding source attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FundingEntry {
    pub agency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,
}

/// A catalog record at its latest version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub rid: RecordId,
    pub version: i64,
    /// Attribute name → value. Ordered by name, which fixes the fingerprint
    /// concatenation order regardless of row arrival order.
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub funding: Vec<FundingEntry>,
}

impl Record {
    pub fn new(rid: impl Into<RecordId>, version: i64) -> Self {
        Self {
            rid: rid.into(),
            version,
            attributes: BTreeMap::new(),
            funding: Vec::new(),
        }
    }

    /// Builder-style attribute insert.
    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_owned(), value.into());
        self
    }

    /// Text value of `name`, if present and not null.
    pub fn text(&self, name: &str) -> Option<String> {
        self.attributes.get(name).and_then(AttributeValue::as_text)
    }
}

// ---------------------------------------------------------------------------
// Files and manifests
// ---------------------------------------------------------------------------

/// Digest algorithm tag carried next to every file digest.
///
/// Local digests are always SHA-256. Tags written by other clients are kept
/// verbatim so a stored manifest still parses; such entries never compare
/// equal to a local digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Other(String),
}

impl From<String> for DigestAlgorithm {
    fn from(tag: String) -> Self {
        if tag.eq_ignore_ascii_case("sha256") {
            DigestAlgorithm::Sha256
        } else {
            DigestAlgorithm::Other(tag)
        }
    }
}

impl From<DigestAlgorithm> for String {
    fn from(algorithm: DigestAlgorithm) -> Self {
        algorithm.to_string()
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha256 => write!(f, "sha256"),
            DigestAlgorithm::Other(tag) => write!(f, "{tag}"),
        }
    }
}

/// A file-set member with its content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "filename")]
    pub path: String,
    #[serde(rename = "hash")]
    pub digest: String,
    #[serde(default)]
    pub algorithm: DigestAlgorithm,
}

/// A set of [`FileEntry`] keyed by path. Paths are unique by construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    entries: BTreeMap<String, FileEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous entry for the same path.
    pub fn insert(&mut self, entry: FileEntry) -> Option<FileEntry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<FileEntry> {
        self.entries.values().cloned().collect()
    }
}

impl FromIterator<FileEntry> for Manifest {
    /// Later entries win when a path repeats.
    fn from_iter<I: IntoIterator<Item = FileEntry>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for entry in iter {
            manifest.insert(entry);
        }
        manifest
    }
}

/// Classification of every path in `origin ∪ current`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManifestDiff {
    pub new: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
    pub updated: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl ManifestDiff {
    /// `true` if nothing was added, modified or removed.
    pub fn is_noop(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn total(&self) -> usize {
        self.new.len() + self.unchanged.len() + self.updated.len() + self.deleted.len()
    }
}

impl fmt::Display for ManifestDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new={} unchanged={} updated={} deleted={}",
            self.new.len(),
            self.unchanged.len(),
            self.updated.len(),
            self.deleted.len()
        )
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of reconciling a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    Created(ExternalId),
    Updated(ExternalId),
    Unchanged,
    Failed(String),
}

impl ReconciliationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ReconciliationOutcome::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationOutcome::Created(_) => "created",
            ReconciliationOutcome::Updated(_) => "updated",
            ReconciliationOutcome::Unchanged => "unchanged",
            ReconciliationOutcome::Failed(_) => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
