//! `curator diff <rid>` — preview the manifest diff an update would submit.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use curator_sync::Reconciler;

use super::{load_candidates, load_config, open_mappings_read_only, open_registry};

/// Arguments for `curator diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Record id to preview.
    pub rid: String,

    /// Query `registry.dev_url` instead of `registry.url`.
    #[arg(long)]
    pub dev: bool,
}

impl DiffArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let records = load_candidates(&config)?;
        let record = records
            .iter()
            .find(|r| r.rid.0 == self.rid)
            .with_context(|| format!("'{}' is not a candidate record", self.rid))?;

        let mappings = open_mappings_read_only(&config)?;
        let registry = open_registry(&config, self.dev);
        let reconciler = Reconciler::from_config(&registry, mappings.as_ref(), &config);

        let Some(preview) = reconciler
            .preview_update(record)
            .with_context(|| format!("diff failed for '{}'", self.rid))?
        else {
            println!("'{}' is not in the registry yet; a run would create it.", self.rid);
            return Ok(());
        };

        println!("{} → {}  {}", self.rid, preview.external_id, preview.diff);
        if !preview.fingerprint_changed {
            println!("Record is unchanged since the last run; a run would skip it.");
        }
        for path in &preview.diff.new {
            println!("  {} {path}", "+".green().bold());
        }
        for path in &preview.diff.updated {
            println!("  {} {path}", "~".yellow().bold());
        }
        for path in &preview.diff.deleted {
            println!("  {} {path}", "-".red().bold());
        }
        for path in &preview.diff.unchanged {
            println!("  {} {path}", "·".bright_black());
        }
        Ok(())
    }
}
