//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame is not valid JSON
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Frame is valid JSON but not an array
    #[error("Frame is not an array")]
    NotAnArray,

    /// First element of the frame is not a string tag
    #[error("Frame tag is not a string")]
    InvalidTag,

    /// Message could not be serialized
    #[error("Encoding error: {0}")]
    Encoding(#[source] serde_json::Error),

    /// Encoded frame exceeds the maximum size
    #[error("Frame too large: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },
}
