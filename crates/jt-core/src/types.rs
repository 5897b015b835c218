//! Core domain types

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::ConfigError;

/// Default notebook server address
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8888";

/// Base address of a notebook server
///
/// Stored without a trailing `/` so resource paths can be appended directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
    url: Url,
}

impl Endpoint {
    /// Parse and normalize a server address
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let base = raw.trim().trim_end_matches('/');

        let url = Url::parse(base)
            .map_err(|e| ConfigError::InvalidEndpoint(format!("{}: {}", raw, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint(format!(
                "{}: scheme must be http or https",
                raw
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidEndpoint(format!("{}: missing host", raw)));
        }

        Ok(Self {
            base: base.to_string(),
            url,
        })
    }

    /// Normalized base address
    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// Parsed form of the base address
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the server is reached over TLS
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// Append a resource path to the base address
    pub fn resource(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

/// Optional bearer token for the notebook server
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(Option<String>);

impl Credential {
    /// Create a credential; an empty token means unauthenticated
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() {
            Self(None)
        } else {
            Self(Some(token))
        }
    }

    /// No credential
    pub fn none() -> Self {
        Self(None)
    }

    /// The raw token, if any
    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Whether a token is present
    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Credential(<redacted>)"),
            None => f.write_str("Credential(None)"),
        }
    }
}

/// Name of a terminal on the notebook server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TerminalName(String);

impl TerminalName {
    /// Create a terminal name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the raw name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerminalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TerminalName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TerminalName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
