//! Core trait definitions

mod connection;
mod provision;

pub use connection::{Connection, Connector, FrameSink, FrameSource};
pub use provision::TerminalProvisioner;
