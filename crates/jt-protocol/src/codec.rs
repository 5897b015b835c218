//! JSON codec for terminal protocol frames
//!
//! Decoding is deliberately lenient: frames that are too short to carry a
//! payload decode to `Ok(None)` so the relay can drop them without treating
//! the connection as broken. Only frames that are not JSON arrays at all, or
//! whose tag is not a string, are reported as errors.

use serde_json::Value;

use crate::error::ProtocolError;
use crate::message::{MessageType, WireMessage};

/// Maximum encoded frame size, one byte short of 16 MiB
pub const MAX_FRAME_SIZE: usize = 0x00FF_FFFF;

/// Encode a message into its JSON text frame
pub fn encode(message: &WireMessage) -> Result<String, ProtocolError> {
    let frame = serde_json::to_string(message).map_err(ProtocolError::Encoding)?;

    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: frame.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    Ok(frame)
}

/// Decode a JSON text frame
///
/// Returns `Ok(None)` for frames that carry nothing to act on: empty arrays,
/// payload types without a payload, unknown tags without a payload, and
/// text types whose payload is not a string.
pub fn decode(frame: &str) -> Result<Option<WireMessage>, ProtocolError> {
    let value: Value = serde_json::from_str(frame).map_err(ProtocolError::Malformed)?;

    let Value::Array(mut items) = value else {
        return Err(ProtocolError::NotAnArray);
    };

    if items.is_empty() {
        return Ok(None);
    }

    let rest = items.split_off(1);
    let tag = match items.pop() {
        Some(Value::String(tag)) => tag,
        // Too short to matter, whatever the tag is
        _ if rest.is_empty() => return Ok(None),
        _ => return Err(ProtocolError::InvalidTag),
    };

    let kind = MessageType::from_tag(&tag);
    // Only signals mean something without a payload
    if rest.is_empty() && !kind.as_ref().is_some_and(MessageType::is_signal) {
        return Ok(None);
    }

    let message = match kind {
        Some(MessageType::Setup) => WireMessage::Setup(rest),
        Some(MessageType::Disconnect) => WireMessage::Disconnect(rest),
        Some(text_type) => match rest.into_iter().next() {
            Some(Value::String(text)) if text_type == MessageType::Stdout => {
                WireMessage::Stdout(text)
            }
            Some(Value::String(text)) => WireMessage::Stdin(text),
            Some(other) => {
                tracing::debug!(tag = %tag, payload = %other, "Dropping non-text payload");
                return Ok(None);
            }
            None => return Ok(None),
        },
        None => WireMessage::Unrecognized {
            kind: tag,
            payload: rest,
        },
    };

    Ok(Some(message))
}
