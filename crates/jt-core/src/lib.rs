//! jt-core: Core abstractions and configuration for jterm
//!
//! This crate provides the data model, error taxonomy, configuration file
//! handling and the transport traits shared by the client components.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{ConfigError, ConnectionError, ProvisionError, SessionError};
pub use types::{Credential, Endpoint, TerminalName};
