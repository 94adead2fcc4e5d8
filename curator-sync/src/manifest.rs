//! Manifest computation and diffing.

use std::path::Path;

use curator_core::{FileEntry, Manifest, ManifestDiff};

use crate::error::SyncError;
use crate::fingerprint::digest_file;

/// Digest every path in `files` into a [`Manifest`].
///
/// Paths under `record_dir` are keyed relative to it; others keep their full
/// path. Directories are skipped, as is anything that is neither a file nor
/// a directory. An unreadable file is an error.
pub fn compute_manifest<P: AsRef<Path>>(record_dir: &Path, files: &[P]) -> Result<Manifest, SyncError> {
    let mut manifest = Manifest::new();
    for path in files {
        let path = path.as_ref();
        if path.is_dir() {
            tracing::debug!(path = %path.display(), "skipping directory in file set");
            continue;
        }
        if path.exists() && !path.is_file() {
            tracing::warn!(path = %path.display(), "skipping non-regular file in file set");
            continue;
        }
        let (digest, algorithm) = digest_file(path)?;
        manifest.insert(FileEntry {
            path: manifest_key(record_dir, path),
            digest,
            algorithm,
        });
    }
    Ok(manifest)
}

fn manifest_key(record_dir: &Path, path: &Path) -> String {
    path.strip_prefix(record_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Classify every path in `origin ∪ current`.
///
/// The four sets are disjoint and together cover the union. An entry whose
/// digest or algorithm changed is `updated`.
pub fn diff(origin: &Manifest, current: &Manifest) -> ManifestDiff {
    let mut result = ManifestDiff::default();
    for entry in current.entries() {
        match origin.get(&entry.path) {
            None => {
                result.new.insert(entry.path.clone());
            }
            Some(before) if before.digest == entry.digest && before.algorithm == entry.algorithm => {
                result.unchanged.insert(entry.path.clone());
            }
            Some(_) => {
                result.updated.insert(entry.path.clone());
            }
        }
    }
    for path in origin.paths() {
        if current.get(path).is_none() {
            result.deleted.insert(path.to_string());
        }
    }
    result
}
