//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;
use crate::types::DEFAULT_ENDPOINT;

/// Configuration for the terminal client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Notebook server base URL
    pub url: String,

    /// Server token (empty for none)
    pub token: String,

    /// Command sent to the remote shell during teardown
    ///
    /// This asks the shell process to exit, which in turn makes the server
    /// close the terminal.
    pub exit_command: String,

    /// Line that ends the interactive loop locally; never forwarded
    pub exit_keyword: String,

    /// Waits used to sequence the session
    pub timings: Timings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            token: String::new(),
            exit_command: "exit".to_string(),
            exit_keyword: "exit".to_string(),
            timings: Timings::default(),
        }
    }
}

/// Upper bounds for the waits between session steps
///
/// Each wait ends early when the event it stands in for is observed
/// (ready signal, output settling, terminal disconnect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Longest wait for the ready signal before accepting input
    #[serde(with = "duration_millis")]
    pub startup_grace: Duration,

    /// Longest wait for a single-shot command's output
    #[serde(with = "duration_millis")]
    pub command_grace: Duration,

    /// Output silence after which a single-shot command counts as finished
    #[serde(with = "duration_millis")]
    pub output_idle: Duration,

    /// Pause after each interactive send so output lands before the next prompt
    #[serde(with = "duration_millis")]
    pub input_pause: Duration,

    /// Longest wait for the terminal to react to the exit command
    #[serde(with = "duration_millis")]
    pub exit_grace: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_secs(1),
            command_grace: Duration::from_secs(2),
            output_idle: Duration::from_millis(300),
            input_pause: Duration::from_millis(100),
            exit_grace: Duration::from_millis(500),
        }
    }
}
