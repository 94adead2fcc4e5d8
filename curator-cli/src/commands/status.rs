//! `curator status` — what a run would do, without doing it.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use curator_sync::{Plan, Reconciler};

use super::{load_candidates, load_config, open_mappings_read_only, open_registry};

/// Arguments for `curator status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize)]
struct RecordStatus {
    rid: String,
    status: &'static str,
    external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct StatusSummary {
    records: usize,
    create: usize,
    update: usize,
    up_to_date: usize,
    error: usize,
}

#[derive(Serialize)]
struct StatusReportJson {
    summary: StatusSummary,
    records: Vec<RecordStatus>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "")]
    indicator: String,
    #[tabled(rename = "rid")]
    rid: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "registry id")]
    external_id: String,
}

impl StatusArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let records = load_candidates(&config)?;
        let mappings = open_mappings_read_only(&config)?;
        let registry = open_registry(&config, false);
        let reconciler = Reconciler::from_config(&registry, mappings.as_ref(), &config);

        let rows: Vec<RecordStatus> = records
            .iter()
            .map(|record| match reconciler.plan(record) {
                Ok(plan) => RecordStatus {
                    rid: record.rid.to_string(),
                    status: plan.label(),
                    external_id: match plan {
                        Plan::Create => None,
                        Plan::Update(id) | Plan::UpToDate(id) => Some(id.0),
                    },
                    error: None,
                },
                Err(err) => RecordStatus {
                    rid: record.rid.to_string(),
                    status: "ERROR",
                    external_id: None,
                    error: Some(err.to_string()),
                },
            })
            .collect();

        let summary = summarize(&rows);
        if self.json {
            let report = StatusReportJson {
                summary,
                records: rows,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        print_table(&rows, &summary);
        Ok(())
    }
}

fn summarize(rows: &[RecordStatus]) -> StatusSummary {
    let count = |label: &str| rows.iter().filter(|r| r.status == label).count();
    StatusSummary {
        records: rows.len(),
        create: count("CREATE"),
        update: count("UPDATE"),
        up_to_date: count("UP TO DATE"),
        error: count("ERROR"),
    }
}

fn print_table(rows: &[RecordStatus], summary: &StatusSummary) {
    if rows.is_empty() {
        println!("No candidate records.");
        return;
    }

    let table_rows: Vec<StatusTableRow> = rows
        .iter()
        .map(|row| StatusTableRow {
            indicator: indicator(row.status),
            rid: row.rid.clone(),
            status: match &row.error {
                Some(err) => format!("{} ({err})", row.status),
                None => row.status.to_string(),
            },
            external_id: row.external_id.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} records: {} to create, {} to update, {} up to date, {} errors",
        summary.records, summary.create, summary.update, summary.up_to_date, summary.error
    );
}

fn indicator(status: &str) -> String {
    match status {
        "CREATE" => "■".cyan().bold().to_string(),
        "UPDATE" => "■".yellow().bold().to_string(),
        "UP TO DATE" => "■".green().bold().to_string(),
        _ => "■".red().bold().to_string(),
    }
}
