//! Configuration management for jterm

mod client;
pub mod serde_utils;

pub use client::{ClientConfig, Timings};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jterm")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load the client configuration
///
/// An explicit path must exist. Without one, the default location is used
/// when present and built-in defaults otherwise.
pub fn load_client_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        tracing::debug!("Loading config from {:?}", default_path);
        load_config(&default_path)
    } else {
        tracing::debug!("Using default configuration");
        Ok(ClientConfig::default())
    }
}
