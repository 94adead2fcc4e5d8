//! Registry document assembly and validation.

use url::Url;

use curator_core::{config::DocumentConfig, ExternalId, Manifest, Record};
use curator_registry::RegistryDocument;

use crate::error::ValidationError;

/// Builds [`RegistryDocument`]s from records using the configured attribute
/// names.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    config: DocumentConfig,
}

impl DocumentBuilder {
    pub fn new(config: DocumentConfig) -> Self {
        Self { config }
    }

    /// Document for a first contribution.
    pub fn build(&self, record: &Record, manifest: &Manifest) -> RegistryDocument {
        let c = &self.config;
        let text = |name: &str| record.text(name).unwrap_or_default().trim().to_string();

        let title = text(&c.title_attribute);
        let title = if title.is_empty() {
            title
        } else {
            format!("{title}{}", c.title_suffix)
        };

        let keywords = text(&c.keywords_attribute)
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();

        let mut acknowledgment = record
            .text(&c.acknowledgment_attribute)
            .unwrap_or_default();
        let mut funding_support: Vec<String> = Vec::new();
        let mut funding = record.funding.clone();
        funding.sort();
        for entry in &funding {
            if !c.funding_agencies.iter().any(|a| a == &entry.agency) {
                continue;
            }
            if !funding_support.contains(&entry.agency) {
                funding_support.push(entry.agency.clone());
            }
            if let Some(grant) = &entry.grant_id {
                acknowledgment.push_str(&format!("\n{}: {grant}", entry.agency));
            }
        }

        RegistryDocument {
            id: None,
            title,
            description: record.text(&c.description_attribute).unwrap_or_default(),
            url: text(&c.url_attribute),
            doi: text(&c.doi_attribute),
            acknowledgment,
            keywords,
            funding_support,
            manifest: manifest.to_vec(),
            extra: Default::default(),
        }
    }

    /// Document replacing entry `id`, carrying stored fields the catalog does
    /// not own from `origin`.
    pub fn build_update(
        &self,
        record: &Record,
        manifest: &Manifest,
        id: &ExternalId,
        origin: &RegistryDocument,
    ) -> RegistryDocument {
        let mut document = self.build(record, manifest);
        document.id = Some(id.clone());
        document.carry_from(origin);
        document
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Reject a document the registry would refuse.
pub fn validate(document: &RegistryDocument) -> Result<(), ValidationError> {
    if document.manifest.is_empty() {
        return Err(ValidationError::EmptyManifest);
    }
    if document.title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let url = document.url.trim();
    if url.is_empty() && document.doi.trim().is_empty() {
        return Err(ValidationError::MissingLocator);
    }
    if !url.is_empty() && !is_web_url(url) {
        return Err(ValidationError::InvalidUrl {
            url: url.to_string(),
        });
    }
    Ok(())
}

/// [`validate`] plus the id an update needs.
pub fn validate_update(document: &RegistryDocument) -> Result<(), ValidationError> {
    match &document.id {
        Some(id) if !id.0.is_empty() => validate(document),
        _ => Err(ValidationError::MissingId),
    }
}

fn is_web_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}
