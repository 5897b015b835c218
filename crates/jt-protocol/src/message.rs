//! Message types for the Jupyter terminal protocol
//!
//! Every frame on the terminal WebSocket is a JSON array whose first element
//! is a string tag and whose remaining elements are the tag-specific payload:
//!
//! ```text
//! ["stdin", "ls -la\n"]        client -> server
//! ["stdout", "total 42\r\n"]   server -> client
//! ["setup", {}]                server -> client, terminal is ready
//! ["disconnect", 1]            server -> client, terminal process exited
//! ```
//!
//! Servers are free to add new tags. Those decode to
//! [`WireMessage::Unrecognized`] and must be ignored by consumers.

use std::fmt;

use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value;

/// Message type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Keyboard input for the remote shell
    Stdin,
    /// Output produced by the remote process
    Stdout,
    /// Terminal is set up and ready for input
    Setup,
    /// Terminal process is gone
    Disconnect,
}

impl MessageType {
    /// Wire tag for this type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Setup => "setup",
            Self::Disconnect => "disconnect",
        }
    }

    /// Parse a wire tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "stdin" => Some(Self::Stdin),
            "stdout" => Some(Self::Stdout),
            "setup" => Some(Self::Setup),
            "disconnect" => Some(Self::Disconnect),
            _ => None,
        }
    }

    /// Whether frames of this type are meaningful without a payload
    pub fn is_signal(&self) -> bool {
        matches!(self, Self::Setup | Self::Disconnect)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded terminal protocol message
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// Input text, sent verbatim to the remote shell
    Stdin(String),

    /// Output text, written verbatim to the local console
    Stdout(String),

    /// Ready signal. Any trailing elements are kept but carry no meaning here.
    Setup(Vec<Value>),

    /// Disconnect signal. Any trailing elements are kept but carry no meaning here.
    Disconnect(Vec<Value>),

    /// A tag this client does not know about
    Unrecognized {
        /// The raw tag
        kind: String,
        /// Everything after the tag
        payload: Vec<Value>,
    },
}

impl WireMessage {
    /// Build an input message
    pub fn stdin(text: impl Into<String>) -> Self {
        Self::Stdin(text.into())
    }

    /// Build an output message
    pub fn stdout(text: impl Into<String>) -> Self {
        Self::Stdout(text.into())
    }

    /// Known message type, or `None` for unrecognized tags
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            Self::Stdin(_) => Some(MessageType::Stdin),
            Self::Stdout(_) => Some(MessageType::Stdout),
            Self::Setup(_) => Some(MessageType::Setup),
            Self::Disconnect(_) => Some(MessageType::Disconnect),
            Self::Unrecognized { .. } => None,
        }
    }

    /// Wire tag of this message
    pub fn tag(&self) -> &str {
        match self {
            Self::Unrecognized { kind, .. } => kind.as_str(),
            known => known
                .message_type()
                .map(|t| t.as_str())
                .unwrap_or_default(),
        }
    }
}

impl Serialize for WireMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Stdin(text) | Self::Stdout(text) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(self.tag())?;
                seq.serialize_element(text)?;
                seq.end()
            }
            Self::Setup(rest) | Self::Disconnect(rest) | Self::Unrecognized { payload: rest, .. } => {
                let mut seq = serializer.serialize_seq(Some(1 + rest.len()))?;
                seq.serialize_element(self.tag())?;
                for value in rest {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}
