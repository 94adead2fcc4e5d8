//! Registry client.
//!
//! | operation    | request                    |
//! |--------------|----------------------------|
//! | `contribute` | `POST {base}api/data/`     |
//! | `update`     | `PUT {base}api/data/`      |
//! | `query`      | `GET {base}api/data/{id}`  |
//!
//! Every request carries `authorization: Bearer <token>`. Calls are bounded
//! by the agent timeout and never retried.

use std::time::Duration;

use curator_core::ExternalId;

use crate::document::{parse_query, parse_receipt, Receipt, RegistryDocument};
use crate::error::RegistryError;

/// Longest slice of an error body kept in [`RegistryError::Http`].
const MAX_ERROR_BODY: usize = 512;

/// The three registry operations the engine drives.
pub trait RegistryApi: Send + Sync {
    /// Create a new entry.
    fn contribute(&self, document: &RegistryDocument) -> Result<Receipt, RegistryError>;

    /// Fetch the stored representation of an entry, including its manifest.
    fn query(&self, id: &ExternalId) -> Result<RegistryDocument, RegistryError>;

    /// Replace an existing entry; `document.id` must be set.
    fn update(&self, document: &RegistryDocument) -> Result<Receipt, RegistryError>;
}

/// Blocking HTTP implementation of [`RegistryApi`].
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl HttpRegistry {
    /// `base_url` must end with `/`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn data_url(&self) -> String {
        format!("{}api/data/", self.base_url)
    }

    fn authorized(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("accept", "application/json")
            .set("Content-Type", "application/json")
            .set("authorization", &format!("Bearer {}", self.token))
    }

    fn send_document(
        &self,
        request: ureq::Request,
        document: &RegistryDocument,
    ) -> Result<Receipt, RegistryError> {
        let payload = serde_json::to_string(document)?;
        let body = read_body(self.authorized(request).send_string(&payload))?;
        parse_receipt(&body)
    }
}

impl RegistryApi for HttpRegistry {
    fn contribute(&self, document: &RegistryDocument) -> Result<Receipt, RegistryError> {
        tracing::debug!(url = %self.data_url(), title = %document.title, "registry contribute");
        self.send_document(self.agent.post(&self.data_url()), document)
    }

    fn query(&self, id: &ExternalId) -> Result<RegistryDocument, RegistryError> {
        let url = format!("{}{}", self.data_url(), id);
        tracing::debug!(url = %url, "registry query");
        let body = read_body(self.authorized(self.agent.get(&url)).call())?;
        parse_query(&body)
    }

    fn update(&self, document: &RegistryDocument) -> Result<Receipt, RegistryError> {
        let Some(id) = document.id.as_ref() else {
            return Err(RegistryError::Rejected(
                "update document has no id".to_string(),
            ));
        };
        tracing::debug!(url = %self.data_url(), external_id = %id, "registry update");
        self.send_document(self.agent.put(&self.data_url()), document)
    }
}

fn read_body(result: Result<ureq::Response, ureq::Error>) -> Result<String, RegistryError> {
    match result {
        Ok(response) => response
            .into_string()
            .map_err(|e| RegistryError::Transport(e.to_string())),
        Err(ureq::Error::Status(status, response)) => {
            let mut message = response.into_string().unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            Err(RegistryError::Http { status, message })
        }
        Err(ureq::Error::Transport(transport)) => {
            Err(RegistryError::Transport(transport.to_string()))
        }
    }
}
