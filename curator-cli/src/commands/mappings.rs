//! `curator mappings` — list rid → registry id associations.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::{load_config, open_mappings_read_only};

/// Arguments for `curator mappings`.
#[derive(Args, Debug)]
pub struct MappingsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize, Tabled)]
struct MappingRow {
    #[tabled(rename = "rid")]
    rid: String,
    #[tabled(rename = "registry id")]
    external_id: String,
}

impl MappingsArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let store = open_mappings_read_only(&config)?;
        let rows: Vec<MappingRow> = store
            .entries()
            .into_iter()
            .map(|(rid, id)| MappingRow {
                rid: rid.0,
                external_id: id.0,
            })
            .collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }
        if rows.is_empty() {
            println!("No mappings recorded.");
            return Ok(());
        }
        let count = rows.len();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{count} mapping(s)");
        Ok(())
    }
}
