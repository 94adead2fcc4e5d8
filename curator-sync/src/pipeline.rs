//! Batch entrypoint: reconcile every record through a bounded worker pool.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use curator_core::{ReconciliationOutcome, Record, RecordId};

use crate::engine::{Reconciler, RecordReport};

/// Per-record reports in input order, plus the records never dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<RecordReport>,
    /// Records not started because the stop flag was raised.
    pub skipped: usize,
}

impl RunSummary {
    fn count(&self, pred: impl Fn(&ReconciliationOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, ReconciliationOutcome::Created(_)))
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, ReconciliationOutcome::Updated(_)))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, ReconciliationOutcome::Unchanged))
    }

    /// Failed rids with their reasons.
    pub fn failures(&self) -> Vec<(&RecordId, &str)> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                ReconciliationOutcome::Failed(reason) => Some((&r.rid, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|r| r.outcome.is_failed())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} unchanged={} failed={} skipped={}",
            self.created(),
            self.updated(),
            self.unchanged(),
            self.failures().len(),
            self.skipped
        )
    }
}

/// Reconcile `records` with up to `workers` threads.
///
/// Workers pull the next index from a shared counter and check `stop` before
/// each dispatch; a record already started always finishes.
pub fn run(
    reconciler: &Reconciler<'_>,
    records: &[Record],
    workers: usize,
    stop: &AtomicBool,
) -> RunSummary {
    let workers = workers.clamp(1, records.len().max(1));
    let next = AtomicUsize::new(0);
    let done: Mutex<Vec<(usize, RecordReport)>> = Mutex::new(Vec::with_capacity(records.len()));

    tracing::info!(records = records.len(), workers, "starting run");
    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(record) = records.get(index) else {
                    break;
                };
                let report = reconciler.reconcile(record);
                tracing::debug!(rid = %report.rid, outcome = report.outcome.label(), "record done");
                done.lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push((index, report));
            });
        }
    });

    let mut done = done.into_inner().unwrap_or_else(|e| e.into_inner());
    done.sort_by_key(|(index, _)| *index);
    let skipped = records.len() - done.len();
    if skipped > 0 {
        tracing::warn!(skipped, "run stopped before every record was dispatched");
    }
    let summary = RunSummary {
        reports: done.into_iter().map(|(_, report)| report).collect(),
        skipped,
    };
    tracing::info!(summary = %summary, "run finished");
    summary
}
