//! `curator run` — reconcile candidate records against the registry.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use curator_core::ReconciliationOutcome;
use curator_sync::{pipeline, Reconciler, RunSummary};

use super::{load_candidates, load_config, open_mappings, open_registry};

/// Arguments for `curator run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Use `registry.dev_url` instead of `registry.url`.
    #[arg(long)]
    pub dev: bool,

    /// Worker threads (default: `run.workers` from config).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Only reconcile these rids. Repeatable.
    #[arg(long = "rid", value_name = "RID")]
    pub rids: Vec<String>,
}

impl RunArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let mut records = load_candidates(&config)?;
        if !self.rids.is_empty() {
            for rid in &self.rids {
                if !records.iter().any(|r| r.rid.0 == *rid) {
                    tracing::warn!(rid = %rid, "requested rid is not a candidate record");
                }
            }
            records.retain(|r| self.rids.contains(&r.rid.0));
        }

        let mappings = open_mappings(&config)?;
        let registry = open_registry(&config, self.dev);
        let reconciler = Reconciler::from_config(&registry, mappings.as_ref(), &config);

        let stop = Arc::new(AtomicBool::new(false));
        stop_on_ctrl_c(Arc::clone(&stop))?;

        let workers = self.workers.unwrap_or_else(|| config.workers()).max(1);
        let summary = pipeline::run(&reconciler, &records, workers, &stop);
        print_summary(&summary);

        let failed = summary.failures().len();
        if failed > 0 {
            bail!("{failed} record(s) failed");
        }
        Ok(())
    }
}

/// Raise `stop` on Ctrl-C. The listener lives on its own thread for the rest
/// of the process.
fn stop_on_ctrl_c(stop: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;
    std::thread::spawn(move || {
        runtime.block_on(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("received ctrl-c, finishing in-flight records");
                    stop.store(true, Ordering::SeqCst);
                }
                Err(err) => tracing::warn!(error = %err, "ctrl-c handler failed"),
            }
        });
    });
    Ok(())
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "rid")]
    rid: String,
    #[tabled(rename = "reason")]
    reason: String,
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.reports {
        match (&report.outcome, &report.diff) {
            (ReconciliationOutcome::Created(id), _) => {
                println!("  {} {} → {id}", "+".green().bold(), report.rid);
            }
            (ReconciliationOutcome::Updated(id), Some(diff)) => {
                println!("  {} {} → {id}  {diff}", "~".yellow().bold(), report.rid);
            }
            _ => {}
        }
    }

    let failures = summary.failures();
    if !failures.is_empty() {
        let rows: Vec<FailureRow> = failures
            .iter()
            .map(|(rid, reason)| FailureRow {
                rid: rid.to_string(),
                reason: reason.to_string(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    println!("Run finished: {summary}");
    if summary.skipped > 0 {
        println!(
            "{}",
            format!("{} record(s) skipped after ctrl-c; re-run to finish.", summary.skipped)
                .yellow()
        );
    }
}
