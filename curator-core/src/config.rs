//! YAML configuration.
//!
//! Default location is `~/.curator/config.yaml`. Every loader has two forms:
//! - `load_at(path)` — explicit path; used in tests with `TempDir`
//! - `load()` — derives the path from `dirs::home_dir()`, delegates to `load_at`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{config_io, ConfigError};

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root for per-record state (`<working_dir>/<rid>/...`).
    pub working_dir: PathBuf,
    pub source: SourceConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Catalog database and candidate selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub database: PathBuf,
    #[serde(default = "default_collection_id")]
    pub collection_id: i64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_funding_relationship")]
    pub funding_relationship: i64,
    /// Accepted attribute names; empty accepts all.
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MappingBackend {
    /// Mapping table inside the catalog database.
    #[default]
    Source,
    /// `<working_dir>/mappings.yaml`.
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MappingConfig {
    #[serde(default)]
    pub backend: MappingBackend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_url: Option<String>,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RegistryConfig {
    /// Base URL with a trailing slash. `dev` selects `dev_url` when set.
    pub fn base_url(&self, dev: bool) -> String {
        let url = match (&self.dev_url, dev) {
            (Some(dev_url), true) => dev_url.as_str(),
            _ => self.url.as_str(),
        };
        if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        }
    }
}

/// Which record attributes feed which document fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub title_attribute: String,
    pub title_suffix: String,
    pub description_attribute: String,
    pub url_attribute: String,
    pub doi_attribute: String,
    pub keywords_attribute: String,
    pub acknowledgment_attribute: String,
    /// Agencies the registry recognises in `fundingSupport`.
    pub funding_agencies: Vec<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            title_attribute: "Title".into(),
            title_suffix: String::new(),
            description_attribute: "Description".into(),
            url_attribute: "URL".into(),
            doi_attribute: "DOI".into(),
            keywords_attribute: "Keywords".into(),
            acknowledgment_attribute: "Acknowledgment".into(),
            funding_agencies: vec!["NASA".into(), "NIH".into(), "NOAA".into(), "NSF".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Whether funding entries participate in the record fingerprint.
    pub include_funding: bool,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            include_funding: true,
        }
    }
}

/// File set registered for each record. `{rid}` in a path expands to the rid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Register the record snapshot (`<record_dir>/record.json`).
    pub snapshot: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            snapshot: true,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

fn default_collection_id() -> i64 {
    56
}

fn default_status() -> String {
    "Curated".to_string()
}

fn default_funding_relationship() -> i64 {
    14
}

fn default_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// `<home>/.curator/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".curator").join("config.yaml")
}

/// Load and validate the config at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path
/// + line context) if malformed, `ConfigError::Missing` if a required
/// setting is empty.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| config_io(path, e))?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper for `~/.curator/config.yaml`.
pub fn load() -> Result<Config, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    load_at(&config_path_at(&home))
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.working_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("working_dir"));
        }
        if self.source.database.as_os_str().is_empty() {
            return Err(ConfigError::Missing("source.database"));
        }
        if self.registry.url.trim().is_empty() {
            return Err(ConfigError::Missing("registry.url"));
        }
        Ok(())
    }

    /// Worker count clamped to at least one.
    pub fn workers(&self) -> usize {
        self.run.workers.max(1)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = "\
working_dir: /var/lib/curator
source:
  database: /var/lib/curator/catalog.sqlite
registry:
  url: https://registry.example.org
";

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn minimal_config_takes_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_at(&write_config(&tmp, MINIMAL)).expect("load");
        assert_eq!(config.source.collection_id, 56);
        assert_eq!(config.source.status, "Curated");
        assert_eq!(config.source.funding_relationship, 14);
        assert_eq!(config.mapping.backend, MappingBackend::Source);
        assert_eq!(config.registry.timeout_secs, 30);
        assert!(config.fingerprint.include_funding);
        assert!(config.files.snapshot);
        assert_eq!(config.workers(), 4);
        assert_eq!(config.document.title_attribute, "Title");
    }

    #[test]
    fn base_url_gets_trailing_slash_and_dev_override() {
        let tmp = TempDir::new().unwrap();
        let body = format!("{MINIMAL}  dev_url: https://dev.example.org/\n");
        let config = load_at(&write_config(&tmp, &body)).expect("load");
        assert_eq!(config.registry.base_url(false), "https://registry.example.org/");
        assert_eq!(config.registry.base_url(true), "https://dev.example.org/");
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = load_at(&tmp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn empty_registry_url_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let body = MINIMAL.replace("https://registry.example.org", "\"\"");
        let err = load_at(&write_config(&tmp, &body)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("registry.url")), "got: {err}");
    }

    #[test]
    fn zero_workers_clamps_to_one() {
        let tmp = TempDir::new().unwrap();
        let body = format!("{MINIMAL}run:\n  workers: 0\n");
        let config = load_at(&write_config(&tmp, &body)).expect("load");
        assert_eq!(config.workers(), 1);
    }
}
