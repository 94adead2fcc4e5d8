//! End-to-end reconciliation against a scripted in-process registry.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use curator_core::{
    config::FilesConfig, mapping::MappingStore, ExternalId, FundingEntry, InMemoryMappingStore,
    ReconciliationOutcome, Record, RecordId,
};
use curator_registry::{Receipt, RegistryApi, RegistryDocument, RegistryError};
use curator_sync::{run, Plan, Reconciler};
use serde_json::json;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fake registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Contribute(String),
    Query(ExternalId),
    Update(ExternalId, String),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    stored: HashMap<ExternalId, RegistryDocument>,
    contributions: usize,
    /// 1-based contribute call that answers with a 500.
    fail_contribution: Option<usize>,
}

#[derive(Default)]
struct FakeRegistry {
    state: Mutex<State>,
}

impl FakeRegistry {
    fn failing_contribution(n: usize) -> Self {
        let registry = Self::default();
        registry.state.lock().unwrap().fail_contribution = Some(n);
        registry
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn stored(&self, id: &str) -> RegistryDocument {
        self.state.lock().unwrap().stored[&ExternalId::from(id)].clone()
    }

    fn seed(&self, id: &str, document: RegistryDocument) {
        self.state
            .lock()
            .unwrap()
            .stored
            .insert(ExternalId::from(id), document);
    }
}

impl RegistryApi for FakeRegistry {
    fn contribute(&self, document: &RegistryDocument) -> Result<Receipt, RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Contribute(document.title.clone()));
        state.contributions += 1;
        if state.fail_contribution == Some(state.contributions) {
            return Err(RegistryError::Http {
                status: 500,
                message: "internal failure".into(),
            });
        }
        let id = ExternalId(format!("E{}", state.stored.len() + 1));
        let mut stored = document.clone();
        stored.id = Some(id.clone());
        state.stored.insert(id.clone(), stored);
        Ok(Receipt {
            body: json!({ "id": id.0 }),
            id,
        })
    }

    fn query(&self, id: &ExternalId) -> Result<RegistryDocument, RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Query(id.clone()));
        state.stored.get(id).cloned().ok_or(RegistryError::Http {
            status: 404,
            message: "no such entry".into(),
        })
    }

    fn update(&self, document: &RegistryDocument) -> Result<Receipt, RegistryError> {
        let mut state = self.state.lock().unwrap();
        let id = document.id.clone().expect("update carries id");
        state
            .calls
            .push(Call::Update(id.clone(), document.title.clone()));
        state.stored.insert(id.clone(), document.clone());
        Ok(Receipt {
            body: json!({ "id": id.0 }),
            id,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record(rid: &str, title: &str) -> Record {
    Record::new(rid, 1)
        .with_attribute("Title", title)
        .with_attribute("URL", "http://x")
}

// ---------------------------------------------------------------------------
// Create / update
// ---------------------------------------------------------------------------

#[test]
fn create_then_update() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::default();
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path());

    let report = engine.reconcile(&record("1", "A"));
    assert_eq!(report.outcome, ReconciliationOutcome::Created(ExternalId::from("E1")));
    assert_eq!(mappings.lookup(&RecordId::from("1")), Some(ExternalId::from("E1")));
    assert_eq!(registry.calls(), vec![Call::Contribute("A".into())]);
    assert!(work.path().join("1/manifest.txt").exists());
    assert!(work.path().join("1/record.json").exists());
    assert!(work.path().join("1/E1.json").exists());

    let report = engine.reconcile(&record("1", "B"));
    assert_eq!(report.outcome, ReconciliationOutcome::Updated(ExternalId::from("E1")));
    assert_eq!(
        registry.calls()[1..],
        [
            Call::Query(ExternalId::from("E1")),
            Call::Update(ExternalId::from("E1"), "B".into()),
        ]
    );
    let diff = report.diff.expect("update reports its diff");
    assert!(diff.updated.contains("record.json"));
    assert!(diff.new.is_empty() && diff.deleted.is_empty());
    assert_eq!(registry.stored("E1").title, "B");
}

#[test]
fn second_run_without_changes_makes_no_registry_calls() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::default();
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path());
    let records = vec![record("1", "A"), record("2", "B"), record("3", "C")];
    let stop = AtomicBool::new(false);

    let first = run(&engine, &records, 2, &stop);
    assert_eq!(first.created(), 3);
    let calls_after_first = registry.calls().len();

    let second = run(&engine, &records, 2, &stop);
    assert_eq!(second.unchanged(), 3);
    assert_eq!(registry.calls().len(), calls_after_first);
}

#[test]
fn mapped_record_without_marker_is_updated() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::default();
    registry.seed("E7", RegistryDocument::default());
    let mappings: InMemoryMappingStore =
        [(RecordId::from("7"), ExternalId::from("E7"))].into_iter().collect();
    let engine = Reconciler::new(&registry, &mappings, work.path());

    let report = engine.reconcile(&record("7", "A"));
    assert_eq!(report.outcome, ReconciliationOutcome::Updated(ExternalId::from("E7")));
    assert_eq!(report.diff.expect("diff").new.len(), 1);
}

#[test]
fn funding_change_triggers_update() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::default();
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path());

    engine.reconcile(&record("1", "A"));
    let mut funded = record("1", "A");
    funded.funding.push(FundingEntry {
        agency: "NSF".into(),
        grant_id: Some("DBI-1".into()),
    });
    let report = engine.reconcile(&funded);
    assert!(matches!(report.outcome, ReconciliationOutcome::Updated(_)));
    assert_eq!(registry.stored("E1").funding_support, vec!["NSF"]);
    assert!(registry.stored("E1").acknowledgment.contains("NSF: DBI-1"));
}

#[test]
fn update_carries_stored_fields_not_sourced_locally() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::default();
    let mut stored = RegistryDocument::default();
    stored
        .extra
        .insert("otherAssociatedIdName".into(), json!("RRID"));
    stored
        .extra
        .insert("otherAssociatedIdValue".into(), json!("SCR_1"));
    registry.seed("E1", stored);
    let mappings: InMemoryMappingStore =
        [(RecordId::from("1"), ExternalId::from("E1"))].into_iter().collect();
    let engine = Reconciler::new(&registry, &mappings, work.path());

    engine.reconcile(&record("1", "A"));
    let updated = registry.stored("E1");
    assert_eq!(updated.extra.get("otherAssociatedIdName"), Some(&json!("RRID")));
    assert_eq!(updated.extra.get("otherAssociatedIdValue"), Some(&json!("SCR_1")));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn invalid_submission_never_reaches_the_registry() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::default();
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path()).with_files(FilesConfig {
        snapshot: false,
        ..FilesConfig::default()
    });

    let bare = Record::new("1", 1).with_attribute("Title", "A");
    let report = engine.reconcile(&bare);
    match report.outcome {
        ReconciliationOutcome::Failed(reason) => {
            assert!(reason.contains("validation"), "reason: {reason}")
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(registry.calls().is_empty());
    assert!(mappings.entries().is_empty());
}

#[test]
fn non_finite_value_fails_only_that_record() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::default();
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path());
    let records = vec![
        record("1", "A").with_attribute("Score", curator_core::AttributeValue::Real(f64::INFINITY)),
        record("2", "B"),
    ];

    let summary = run(&engine, &records, 1, &AtomicBool::new(false));
    assert_eq!(summary.created(), 1);
    assert_eq!(summary.failures()[0].0, &RecordId::from("1"));
}

#[test]
fn one_failed_contribution_does_not_stop_the_batch() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::failing_contribution(2);
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path());
    let records = vec![record("1", "A"), record("2", "B"), record("3", "C")];

    let summary = run(&engine, &records, 1, &AtomicBool::new(false));
    assert_eq!(summary.created(), 2);
    let failures = summary.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, &RecordId::from("2"));
    assert!(failures[0].1.contains("500"), "reason: {}", failures[0].1);
    assert!(summary.has_failures());
    assert!(mappings.lookup(&RecordId::from("2")).is_none());
    assert!(!work.path().join("2/manifest.txt").exists());
    assert_eq!(
        summary.to_string(),
        "created=2 updated=0 unchanged=0 failed=1 skipped=0"
    );
}

#[test]
fn raised_stop_flag_skips_undispatched_records() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::default();
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path());
    let records = vec![record("1", "A"), record("2", "B")];

    let summary = run(&engine, &records, 4, &AtomicBool::new(true));
    assert_eq!(summary.skipped, 2);
    assert!(summary.reports.is_empty());
    assert!(registry.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Plan / preview
// ---------------------------------------------------------------------------

#[test]
fn plan_follows_mapping_and_marker_without_side_effects() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::default();
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path());

    assert_eq!(engine.plan(&record("1", "A")).unwrap(), Plan::Create);
    assert!(!work.path().join("1").exists());

    engine.reconcile(&record("1", "A"));
    let calls = registry.calls().len();
    assert_eq!(
        engine.plan(&record("1", "A")).unwrap(),
        Plan::UpToDate(ExternalId::from("E1"))
    );
    assert_eq!(
        engine.plan(&record("1", "B")).unwrap(),
        Plan::Update(ExternalId::from("E1"))
    );
    assert_eq!(registry.calls().len(), calls);
}

#[test]
fn preview_reports_diff_and_writes_nothing() {
    let work = TempDir::new().expect("work");
    let registry = FakeRegistry::default();
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path());

    assert!(engine.preview_update(&record("1", "A")).unwrap().is_none());

    engine.reconcile(&record("1", "A"));
    let marker = std::fs::read_to_string(work.path().join("1/manifest.txt")).unwrap();
    let snapshot = std::fs::read(work.path().join("1/record.json")).unwrap();

    let preview = engine
        .preview_update(&record("1", "B"))
        .unwrap()
        .expect("mapped");
    assert_eq!(preview.external_id, ExternalId::from("E1"));
    assert!(preview.fingerprint_changed);
    assert!(preview.diff.updated.contains("record.json"));

    assert_eq!(
        std::fs::read_to_string(work.path().join("1/manifest.txt")).unwrap(),
        marker
    );
    assert_eq!(std::fs::read(work.path().join("1/record.json")).unwrap(), snapshot);
    assert_eq!(registry.calls().last(), Some(&Call::Query(ExternalId::from("E1"))));
}

#[test]
fn extra_files_join_the_manifest() {
    let work = TempDir::new().expect("work");
    let data = TempDir::new().expect("data");
    std::fs::create_dir_all(data.path().join("1")).unwrap();
    std::fs::write(data.path().join("1/table.csv"), "a,b\n").unwrap();
    std::fs::write(data.path().join("1/scratch.tmp"), "x").unwrap();

    let registry = FakeRegistry::default();
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path()).with_files(FilesConfig {
        snapshot: true,
        include: vec![format!("{}/{{rid}}", data.path().display())],
        exclude: vec![format!("{}/{{rid}}/scratch.tmp", data.path().display())],
    });

    engine.reconcile(&record("1", "A"));
    let stored = registry.stored("E1");
    let paths: Vec<&str> = stored.manifest.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths.len(), 2, "paths: {paths:?}");
    assert!(paths.contains(&"record.json"));
    assert!(paths.iter().any(|p| p.ends_with("table.csv")));
}

#[cfg(unix)]
#[test]
fn broken_links_in_included_directory_are_skipped() {
    use std::os::unix::fs::symlink;

    let work = TempDir::new().expect("work");
    let data = TempDir::new().expect("data");
    let dir = data.path().join("d");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("a.csv"), "a,b\n").unwrap();
    symlink(data.path().join("missing"), dir.join("stale-link")).unwrap();
    symlink(&dir, dir.join("loop")).unwrap();

    let registry = FakeRegistry::default();
    let mappings = InMemoryMappingStore::new();
    let engine = Reconciler::new(&registry, &mappings, work.path()).with_files(FilesConfig {
        snapshot: true,
        include: vec![dir.display().to_string()],
        exclude: vec![],
    });

    let records = vec![record("1", "A"), record("2", "B")];
    let summary = run(&engine, &records, 2, &AtomicBool::new(false));
    assert_eq!(summary.created(), 2, "summary: {summary}");
    assert!(!summary.has_failures());

    let stored = registry.stored("E1");
    let paths: Vec<&str> = stored.manifest.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths.len(), 2, "paths: {paths:?}");
    assert!(paths.iter().any(|p| p.ends_with("a.csv")));
}
