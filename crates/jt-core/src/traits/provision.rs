//! Terminal provisioning trait

use async_trait::async_trait;

use crate::error::ProvisionError;
use crate::types::{Credential, Endpoint, TerminalName};

/// Allocates new terminals on a notebook server
#[async_trait]
pub trait TerminalProvisioner: Send + Sync {
    /// Create a terminal and return its name
    async fn provision(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
    ) -> Result<TerminalName, ProvisionError>;
}
