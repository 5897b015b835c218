//! jterm: Command-line client for Jupyter server terminals
//!
//! Provisions (or attaches to) a terminal on a notebook server, connects to
//! its WebSocket and relays console input and terminal output.

pub mod output;
pub mod provision;
pub mod relay;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;
