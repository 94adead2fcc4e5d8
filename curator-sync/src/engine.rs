//! Reconciliation engine.
//!
//! ## Per-record protocol
//!
//! 1. Look the rid up in the mapping store.
//! 2. Unmapped: fingerprint, write the snapshot, compute the manifest,
//!    validate, `contribute`, record the mapping, save the receipt, write the
//!    marker. Outcome `Created`.
//! 3. Mapped: fingerprint and compare with the marker.
//!    - Equal: outcome `Unchanged`, no registry call.
//!    - Different or missing: `query` the stored entry, compute the manifest
//!      and its diff against the stored one, validate, `update`, save the
//!      receipt, write the marker. Outcome `Updated`.
//!
//! The marker is written last, so an interrupted record is retried on the
//! next run. Any error ends the record as `Failed`; nothing is retried.

use std::path::{Path, PathBuf};

use curator_core::{
    config::FilesConfig, mapping::MappingStore, Config, DigestAlgorithm, ExternalId, FileEntry,
    Fingerprint, Manifest, ManifestDiff, ReconciliationOutcome, Record, RecordId,
};
use curator_registry::{Receipt, RegistryApi};

use crate::error::SyncError;
use crate::fingerprint::{digest_bytes, expand_file_set, Fingerprinter};
use crate::manifest::{compute_manifest, diff};
use crate::marker::{
    read_marker, record_dir_at, write_marker, write_receipt, write_snapshot, RecordSnapshot,
    SNAPSHOT_FILE,
};
use crate::submission::{validate, validate_update, DocumentBuilder};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What a reconcile pass would do for a record. No side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Create,
    Update(ExternalId),
    UpToDate(ExternalId),
}

impl Plan {
    pub fn label(&self) -> &'static str {
        match self {
            Plan::Create => "CREATE",
            Plan::Update(_) => "UPDATE",
            Plan::UpToDate(_) => "UP TO DATE",
        }
    }
}

/// Outcome of one record, with the manifest diff when an update was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    pub rid: RecordId,
    pub outcome: ReconciliationOutcome,
    pub diff: Option<ManifestDiff>,
}

/// The diff an update would submit, computed without writing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePreview {
    pub external_id: ExternalId,
    /// `false` when the marker matches and a run would skip the record.
    pub fingerprint_changed: bool,
    pub diff: ManifestDiff,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler<'a> {
    registry: &'a dyn RegistryApi,
    mappings: &'a dyn MappingStore,
    working_dir: PathBuf,
    fingerprinter: Fingerprinter,
    documents: DocumentBuilder,
    files: FilesConfig,
}

impl<'a> Reconciler<'a> {
    /// Engine with default document, fingerprint and file-set settings.
    pub fn new(
        registry: &'a dyn RegistryApi,
        mappings: &'a dyn MappingStore,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            mappings,
            working_dir: working_dir.into(),
            fingerprinter: Fingerprinter::default(),
            documents: DocumentBuilder::default(),
            files: FilesConfig::default(),
        }
    }

    pub fn from_config(
        registry: &'a dyn RegistryApi,
        mappings: &'a dyn MappingStore,
        config: &Config,
    ) -> Self {
        Self::new(registry, mappings, config.working_dir.clone())
            .with_fingerprinter(Fingerprinter::new(config.fingerprint.include_funding))
            .with_documents(DocumentBuilder::new(config.document.clone()))
            .with_files(config.files.clone())
    }

    pub fn with_fingerprinter(mut self, fingerprinter: Fingerprinter) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    pub fn with_documents(mut self, documents: DocumentBuilder) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_files(mut self, files: FilesConfig) -> Self {
        self.files = files;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Reconcile one record. Errors become [`ReconciliationOutcome::Failed`].
    pub fn reconcile(&self, record: &Record) -> RecordReport {
        let rid = record.rid.clone();
        let result = match self.mappings.lookup(&rid) {
            None => self.contribute(record).map(|id| (ReconciliationOutcome::Created(id), None)),
            Some(id) => self.refresh(record, id),
        };
        match result {
            Ok((outcome, diff)) => RecordReport { rid, outcome, diff },
            Err(err) => {
                tracing::warn!(rid = %rid, error = %err, "record failed");
                RecordReport {
                    rid,
                    outcome: ReconciliationOutcome::Failed(err.to_string()),
                    diff: None,
                }
            }
        }
    }

    pub fn plan(&self, record: &Record) -> Result<Plan, SyncError> {
        let Some(id) = self.mappings.lookup(&record.rid) else {
            return Ok(Plan::Create);
        };
        if self.is_current(record)? {
            Ok(Plan::UpToDate(id))
        } else {
            Ok(Plan::Update(id))
        }
    }

    /// Query the stored entry and diff it against the current file set.
    /// Returns `None` for an unmapped record.
    pub fn preview_update(&self, record: &Record) -> Result<Option<UpdatePreview>, SyncError> {
        let Some(external_id) = self.mappings.lookup(&record.rid) else {
            return Ok(None);
        };
        let fingerprint = self.fingerprinter.fingerprint(record)?;
        let record_dir = self.record_dir(&record.rid);
        let fingerprint_changed = read_marker(&record_dir)?.as_ref() != Some(&fingerprint);
        let origin = self.registry.query(&external_id)?;
        let current = self.current_manifest(record, &fingerprint, &record_dir, false)?;
        Ok(Some(UpdatePreview {
            external_id,
            fingerprint_changed,
            diff: diff(&origin.origin_manifest(), &current),
        }))
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    fn record_dir(&self, rid: &RecordId) -> PathBuf {
        record_dir_at(&self.working_dir, rid)
    }

    fn is_current(&self, record: &Record) -> Result<bool, SyncError> {
        let fingerprint = self.fingerprinter.fingerprint(record)?;
        let marker = read_marker(&self.record_dir(&record.rid))?;
        Ok(marker.as_ref() == Some(&fingerprint))
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    fn contribute(&self, record: &Record) -> Result<ExternalId, SyncError> {
        let rid = &record.rid;
        let fingerprint = self.fingerprinter.fingerprint(record)?;
        let record_dir = self.record_dir(rid);
        let manifest = self.current_manifest(record, &fingerprint, &record_dir, true)?;

        let document = self.documents.build(record, &manifest);
        validate(&document)?;

        let receipt = self.registry.contribute(&document)?;
        tracing::info!(rid = %rid, external_id = %receipt.id, files = manifest.len(), "contributed");

        if let Err(err) = self.mappings.record(rid, &receipt.id) {
            tracing::error!(
                rid = %rid,
                external_id = %receipt.id,
                error = %err,
                "registry entry created but mapping not recorded"
            );
            return Err(err.into());
        }
        self.finish(&record_dir, &receipt, &fingerprint)?;
        Ok(receipt.id)
    }

    // -----------------------------------------------------------------------
    // Compare / update
    // -----------------------------------------------------------------------

    fn refresh(
        &self,
        record: &Record,
        id: ExternalId,
    ) -> Result<(ReconciliationOutcome, Option<ManifestDiff>), SyncError> {
        let rid = &record.rid;
        let fingerprint = self.fingerprinter.fingerprint(record)?;
        let record_dir = self.record_dir(rid);

        let marker = read_marker(&record_dir)?;
        if marker.as_ref() == Some(&fingerprint) {
            tracing::debug!(rid = %rid, external_id = %id, "up to date");
            return Ok((ReconciliationOutcome::Unchanged, None));
        }
        if marker.is_none() {
            tracing::debug!(rid = %rid, "no marker; treating mapped record as changed");
        }

        let origin = self.registry.query(&id)?;
        let manifest = self.current_manifest(record, &fingerprint, &record_dir, true)?;
        let changes = diff(&origin.origin_manifest(), &manifest);
        tracing::info!(rid = %rid, external_id = %id, diff = %changes, "manifest diff");
        tracing::debug!(
            rid = %rid,
            new = ?changes.new,
            updated = ?changes.updated,
            deleted = ?changes.deleted,
            "manifest diff paths"
        );

        let document = self.documents.build_update(record, &manifest, &id, &origin);
        validate_update(&document)?;

        let receipt = self.registry.update(&document)?;
        if receipt.id != id {
            tracing::warn!(rid = %rid, expected = %id, returned = %receipt.id, "update returned a different id");
        }
        tracing::info!(rid = %rid, external_id = %id, "updated");
        self.finish(&record_dir, &receipt, &fingerprint)?;
        Ok((ReconciliationOutcome::Updated(id), Some(changes)))
    }

    fn finish(
        &self,
        record_dir: &Path,
        receipt: &Receipt,
        fingerprint: &Fingerprint,
    ) -> Result<(), SyncError> {
        write_receipt(record_dir, &receipt.id, &receipt.body)?;
        write_marker(record_dir, fingerprint)
    }

    // -----------------------------------------------------------------------
    // File set
    // -----------------------------------------------------------------------

    /// Snapshot entry plus the configured extra files. With `persist` the
    /// snapshot is written to disk; otherwise only its digest is computed.
    fn current_manifest(
        &self,
        record: &Record,
        fingerprint: &Fingerprint,
        record_dir: &Path,
        persist: bool,
    ) -> Result<Manifest, SyncError> {
        let mut manifest = Manifest::new();
        if self.files.snapshot {
            let bytes = RecordSnapshot::new(record, fingerprint).to_bytes()?;
            if persist {
                write_snapshot(record_dir, &bytes)?;
            }
            manifest.insert(FileEntry {
                path: SNAPSHOT_FILE.to_string(),
                digest: digest_bytes(&bytes),
                algorithm: DigestAlgorithm::Sha256,
            });
        }

        let include = self.expand_templates(&self.files.include, &record.rid, record_dir);
        if !include.is_empty() {
            let exclude = self.expand_templates(&self.files.exclude, &record.rid, record_dir);
            let files = expand_file_set(&include, &exclude)?;
            for entry in compute_manifest(record_dir, &files)?.entries() {
                manifest.insert(entry.clone());
            }
        }
        Ok(manifest)
    }

    /// `{rid}` expands to the rid; relative paths resolve against the
    /// record directory.
    fn expand_templates(&self, templates: &[String], rid: &RecordId, record_dir: &Path) -> Vec<PathBuf> {
        templates
            .iter()
            .map(|t| {
                let path = PathBuf::from(t.replace("{rid}", &rid.path_component()));
                if path.is_absolute() {
                    path
                } else {
                    record_dir.join(path)
                }
            })
            .collect()
    }
}
