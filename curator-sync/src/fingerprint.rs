//! Record fingerprints and file digests.
//!
//! A record's fingerprint is SHA-256 over a canonical encoding of its
//! attributes in name order:
//!
//! ```text
//! name 0x1F typed-value 0x1E      typed-value = n | i:<int> | r:<float> | t:<text>
//! ```
//!
//! followed, when funding is included, by `0x1D` and one
//! `agency 0x1F grant 0x1E` per funding entry in sorted order. The rid and
//! version never participate.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use curator_core::{AttributeValue, DigestAlgorithm, Fingerprint, Record};

use crate::error::{io_err, FingerprintError, SyncError};

const UNIT_SEPARATOR: u8 = 0x1F;
const RECORD_SEPARATOR: u8 = 0x1E;
const GROUP_SEPARATOR: u8 = 0x1D;

/// Read buffer for [`digest_file`].
const BLOCK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprinter {
    include_funding: bool,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self {
            include_funding: true,
        }
    }
}

impl Fingerprinter {
    pub fn new(include_funding: bool) -> Self {
        Self { include_funding }
    }

    pub fn fingerprint(&self, record: &Record) -> Result<Fingerprint, FingerprintError> {
        let mut hasher = Sha256::new();
        for (name, value) in &record.attributes {
            hasher.update(name.as_bytes());
            hasher.update([UNIT_SEPARATOR]);
            match value {
                AttributeValue::Null => hasher.update(b"n"),
                AttributeValue::Integer(i) => hasher.update(format!("i:{i}").as_bytes()),
                AttributeValue::Real(r) => {
                    if !r.is_finite() {
                        return Err(FingerprintError::NonFinite {
                            attribute: name.clone(),
                        });
                    }
                    hasher.update(format!("r:{r}").as_bytes());
                }
                AttributeValue::Text(s) => {
                    hasher.update(b"t:");
                    hasher.update(s.as_bytes());
                }
            }
            hasher.update([RECORD_SEPARATOR]);
        }

        if self.include_funding && !record.funding.is_empty() {
            let mut funding = record.funding.clone();
            funding.sort();
            hasher.update([GROUP_SEPARATOR]);
            for entry in &funding {
                hasher.update(entry.agency.as_bytes());
                hasher.update([UNIT_SEPARATOR]);
                if let Some(grant) = &entry.grant_id {
                    hasher.update(b"g:");
                    hasher.update(grant.as_bytes());
                }
                hasher.update([RECORD_SEPARATOR]);
            }
        }

        Ok(Fingerprint(hex::encode(hasher.finalize())))
    }
}

// ---------------------------------------------------------------------------
// File digests
// ---------------------------------------------------------------------------

/// SHA-256 of an in-memory buffer, lowercase hex.
pub fn digest_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Stream `path` through SHA-256 in fixed-size blocks.
pub fn digest_file(path: &Path) -> Result<(String, DigestAlgorithm), SyncError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| io_err(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok((hex::encode(hasher.finalize()), DigestAlgorithm::Sha256))
}

/// Expand `include` into a sorted, de-duplicated list of files.
///
/// Directories are walked recursively. A file listed in `exclude` is
/// dropped, as is everything under an excluded directory. Missing include
/// paths are kept so that digesting them reports the I/O error. Inside a
/// walked directory only entries resolving to regular files are kept;
/// dangling links, symlinked directories and special files are skipped.
pub fn expand_file_set(include: &[PathBuf], exclude: &[PathBuf]) -> Result<Vec<PathBuf>, SyncError> {
    let mut files = Vec::new();
    for path in include {
        if is_excluded(path, exclude) {
            continue;
        }
        if path.is_dir() {
            walk(path, exclude, &mut files)?;
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn walk(dir: &Path, exclude: &[PathBuf], out: &mut Vec<PathBuf>) -> Result<(), SyncError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if is_excluded(&path, exclude) {
            continue;
        }
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            walk(&path, exclude, out)?;
        } else if file_type.is_file() {
            out.push(path);
        } else if file_type.is_symlink() {
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => out.push(path),
                Ok(meta) if meta.is_dir() => {
                    tracing::warn!(path = %path.display(), "skipping symlinked directory in file set");
                }
                Ok(_) => {
                    tracing::warn!(path = %path.display(), "skipping link to non-regular file in file set");
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unresolvable link in file set");
                }
            }
        } else {
            tracing::warn!(path = %path.display(), "skipping non-regular file in file set");
        }
    }
    Ok(())
}

fn is_excluded(path: &Path, exclude: &[PathBuf]) -> bool {
    exclude.iter().any(|ex| path.starts_with(ex))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
