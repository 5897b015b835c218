//! Terminal provisioning over the notebook server REST API

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::Value;

use jt_core::traits::TerminalProvisioner;
use jt_core::{Credential, Endpoint, ProvisionError, TerminalName};

/// Terminal collection resource, relative to the server base URL
const TERMINALS_PATH: &str = "api/terminals";

/// Creates terminals with `POST /api/terminals`
#[derive(Debug, Clone, Default)]
pub struct HttpProvisioner {
    http: reqwest::Client,
}

impl HttpProvisioner {
    /// Create a provisioner with a default HTTP client
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TerminalProvisioner for HttpProvisioner {
    async fn provision(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
    ) -> Result<TerminalName, ProvisionError> {
        let url = endpoint.resource(TERMINALS_PATH);
        tracing::debug!(url = %url, "Creating terminal");

        let mut request = self.http.post(&url);
        if let Some(token) = credential.token() {
            request = request.header(AUTHORIZATION, format!("token {}", token));
        }

        let response = request.send().await?;
        let status = response.status();

        // Servers answer either 200 or 201 here
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let name = parse_terminal_name(&body)?;
        tracing::info!(terminal = %name, "Created terminal");
        Ok(name)
    }
}

/// Extract the `name` field of a terminal model
fn parse_terminal_name(body: &[u8]) -> Result<TerminalName, ProvisionError> {
    let model: Value = serde_json::from_slice(body)?;

    model
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(TerminalName::from)
        .ok_or(ProvisionError::MissingIdentifier)
}
