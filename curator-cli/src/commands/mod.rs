//! Subcommands and the setup they share.

pub mod diff;
pub mod mappings;
pub mod run;
pub mod status;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use curator_core::{
    config::{self, MappingBackend},
    mapping::mapping_path_at,
    Config, FileMappingStore, MappingStore, Record,
};
use curator_registry::HttpRegistry;
use curator_source::{load_records, SqliteMappingStore, SqliteSource};

/// Overrides `registry.token` when set and non-empty.
const TOKEN_ENV: &str = "CURATOR_TOKEN";

/// Load the config from `path`, or from `~/.curator/config.yaml`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => config::load_at(path),
        None => config::load(),
    }
    .context("failed to load curator config")?;

    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.is_empty() {
            config.registry.token = token;
        }
    }
    Ok(config)
}

/// Candidate records, collapsed and with funding attached.
pub fn load_candidates(config: &Config) -> Result<Vec<Record>> {
    let source = SqliteSource::open(&config.source).context("failed to open catalog")?;
    load_records(&source, &config.source.attributes).context("failed to read catalog records")
}

/// Mapping store for `run`. The SQLite backend creates its table if absent.
pub fn open_mappings(config: &Config) -> Result<Box<dyn MappingStore>> {
    open_mapping_store(config, true)
}

/// Mapping store for commands that only read; the catalog is opened
/// read-only and a missing mapping table reads as empty.
pub fn open_mappings_read_only(config: &Config) -> Result<Box<dyn MappingStore>> {
    open_mapping_store(config, false)
}

fn open_mapping_store(config: &Config, writable: bool) -> Result<Box<dyn MappingStore>> {
    let store: Box<dyn MappingStore> = match config.mapping.backend {
        MappingBackend::Source => {
            let database = &config.source.database;
            let store = if writable {
                SqliteMappingStore::open(database)
            } else {
                SqliteMappingStore::open_read_only(database)
            };
            Box::new(store.context("failed to load mapping table")?)
        }
        MappingBackend::File => Box::new(
            FileMappingStore::open_at(mapping_path_at(&config.working_dir))
                .context("failed to load mapping file")?,
        ),
    };
    Ok(store)
}

pub fn open_registry(config: &Config, dev: bool) -> HttpRegistry {
    let base_url = config.registry.base_url(dev);
    tracing::debug!(url = %base_url, "registry endpoint");
    HttpRegistry::new(
        base_url,
        config.registry.token.clone(),
        Duration::from_secs(config.registry.timeout_secs),
    )
}
