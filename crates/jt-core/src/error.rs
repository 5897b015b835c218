//! Core error types for jterm

use jt_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a client session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Terminal could not be provisioned
    #[error("Failed to create terminal: {0}")]
    Provision(#[from] ProvisionError),

    /// Connection could not be established
    #[error("Failed to connect: {0}")]
    Connection(#[from] ConnectionError),

    /// Outbound message could not be encoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Writing to an established connection failed
    #[error("Failed to send command: {0}")]
    Send(#[source] ConnectionError),

    /// No terminal has been provisioned or attached yet
    #[error("No terminal bound to this session")]
    Unbound,

    /// A terminal is already bound to this session
    #[error("Session is already bound to terminal {0}")]
    AlreadyBound(String),

    /// The session already holds a live connection
    #[error("Session is already connected")]
    AlreadyConnected,

    /// No connection is open
    #[error("Session is not connected")]
    NotConnected,

    /// The session has been torn down and cannot reconnect
    #[error("Session is closed")]
    Closed,

    /// Cancelled before the session was established
    #[error("Interrupted before the terminal was connected")]
    Interrupted,

    /// Local console I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal provisioning errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// HTTP request could not be completed
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not JSON
    #[error("Invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// Response did not carry a terminal name
    #[error("Terminal identifier not found in response")]
    MissingIdentifier,
}

/// Transport connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Connection target could not be derived from the endpoint
    #[error("Invalid connection target: {0}")]
    InvalidTarget(String),

    /// Dialing the WebSocket failed
    #[error("WebSocket dial to {url} failed: {reason}")]
    ConnectFailed { url: String, reason: String },

    /// Writing a frame failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Peer went away without a clean close
    #[error("Connection closed abnormally: {0}")]
    AbnormalClose(String),

    /// Connection is already closed
    #[error("Connection closed")]
    Closed,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Server URL is unusable
    #[error("Invalid server URL: {0}")]
    InvalidEndpoint(String),
}
