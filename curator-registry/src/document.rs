//! Registry wire format.
//!
//! A [`RegistryDocument`] is what `contribute` and `update` send and what
//! `query` returns. Fields the engine does not model are kept in
//! [`RegistryDocument::extra`] so a queried document survives a round trip.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use curator_core::{ExternalId, FileEntry, Manifest};

use crate::error::RegistryError;

/// Stored fields that are not sourced from the catalog and must be carried
/// from the queried document into an update.
pub const CARRIED_FIELDS: &[&str] = &["otherAssociatedIdName", "otherAssociatedIdValue"];

const DOC_TYPE_ERROR: &str = "org.osc.Error";
const DOC_TYPE_AUTH_FAILED: &str = "org.osc.AuthenticationFailed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RegistryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ExternalId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub doi: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub acknowledgment: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(
        default,
        rename = "fundingSupport",
        deserialize_with = "null_as_default"
    )]
    pub funding_support: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub manifest: Vec<FileEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistryDocument {
    /// The stored file set, keyed by path.
    pub fn origin_manifest(&self) -> Manifest {
        self.manifest.iter().cloned().collect()
    }

    /// Copy [`CARRIED_FIELDS`] from `origin`, defaulting each to `""`.
    pub fn carry_from(&mut self, origin: &RegistryDocument) {
        for field in CARRIED_FIELDS {
            let value = origin
                .extra
                .get(*field)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()));
            self.extra.insert((*field).to_string(), value);
        }
    }
}

/// Successful contribute/update response.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub id: ExternalId,
    /// Full response body, saved verbatim as the local receipt.
    pub body: Value,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default, rename = "docType")]
    doc_type: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    info: Option<String>,
}

/// Map an error `docType` to a [`RegistryError`]; `Ok` for anything else.
fn check_doc_type(envelope: &Envelope) -> Result<(), RegistryError> {
    match envelope.doc_type.as_deref() {
        Some(DOC_TYPE_ERROR) => Err(RegistryError::Rejected(
            envelope
                .error_message
                .clone()
                .or_else(|| envelope.info.clone())
                .unwrap_or_else(|| "unspecified error".to_string()),
        )),
        Some(DOC_TYPE_AUTH_FAILED) => Err(RegistryError::AuthenticationFailed),
        _ => Ok(()),
    }
}

/// Parse a contribute/update response body.
pub fn parse_receipt(body: &str) -> Result<Receipt, RegistryError> {
    let value: Value = serde_json::from_str(body)?;
    let envelope: Envelope = serde_json::from_value(value.clone())?;
    check_doc_type(&envelope)?;
    match envelope.id {
        Some(id) if !id.is_empty() => Ok(Receipt {
            id: ExternalId(id),
            body: value,
        }),
        _ => Err(RegistryError::Malformed("response has no id".to_string())),
    }
}

/// Parse a query response body.
///
/// The registry answers with an array whose first element is the document,
/// either as an object or as a string holding the document's JSON. A bare
/// object is accepted too.
pub fn parse_query(body: &str) -> Result<RegistryDocument, RegistryError> {
    let value: Value = serde_json::from_str(body)?;
    let first = match value {
        Value::Array(mut items) => {
            if items.is_empty() {
                return Err(RegistryError::Malformed("empty query result".to_string()));
            }
            items.swap_remove(0)
        }
        other => other,
    };
    let document = match first {
        Value::String(encoded) => serde_json::from_str::<Value>(&encoded)?,
        other => other,
    };
    if !document.is_object() {
        return Err(RegistryError::Malformed(
            "query result is not a document".to_string(),
        ));
    }
    let envelope: Envelope = serde_json::from_value(document.clone())?;
    check_doc_type(&envelope)?;
    Ok(serde_json::from_value(document)?)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
