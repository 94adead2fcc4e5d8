//! # curator-sync
//!
//! Fingerprinting, manifest diffing and the reconciliation engine.
//!
//! Build a [`Reconciler`] over a registry and a mapping store, then call
//! [`Reconciler::reconcile`] per record or [`pipeline::run`] for a batch.

pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod marker;
pub mod pipeline;
pub mod submission;

pub use engine::{Plan, Reconciler, RecordReport, UpdatePreview};
pub use error::{FingerprintError, SyncError, ValidationError};
pub use fingerprint::Fingerprinter;
pub use pipeline::{run, RunSummary};
pub use submission::DocumentBuilder;
