//! jt-protocol: Wire protocol for Jupyter terminal sessions
//!
//! This crate defines the JSON message envelope exchanged with a notebook
//! server over the terminal WebSocket.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{decode, encode, MAX_FRAME_SIZE};
pub use error::ProtocolError;
pub use message::{MessageType, WireMessage};
