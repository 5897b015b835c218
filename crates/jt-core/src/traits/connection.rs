//! Connection traits
//!
//! A terminal connection is split into a write half ([`FrameSink`]) and a
//! read half ([`FrameSource`]) so the receive loop can own the reader while
//! any number of tasks send through a shared writer.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ConnectionError;
use crate::types::{Credential, Endpoint, TerminalName};

/// Write half of a message-framed connection
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Send one text frame
    async fn send_text(&self, frame: String) -> Result<(), ConnectionError>;

    /// Close the connection gracefully
    async fn close(&self) -> Result<(), ConnectionError>;
}

/// Read half of a message-framed connection
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next text frame
    ///
    /// Returns `Ok(None)` once the peer has closed the connection cleanly.
    async fn next_text(&mut self) -> Result<Option<String>, ConnectionError>;
}

/// An open bidirectional connection to a terminal
pub struct Connection {
    sink: Arc<dyn FrameSink>,
    source: Box<dyn FrameSource>,
}

impl Connection {
    /// Pair a write half with a read half
    pub fn new(sink: impl FrameSink + 'static, source: impl FrameSource + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            source: Box::new(source),
        }
    }

    /// Split into the shared write half and the owned read half
    pub fn into_split(self) -> (Arc<dyn FrameSink>, Box<dyn FrameSource>) {
        (self.sink, self.source)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Establishes connections to terminals
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to the named terminal
    async fn connect(
        &self,
        endpoint: &Endpoint,
        terminal: &TerminalName,
        credential: &Credential,
    ) -> Result<Connection, ConnectionError>;
}
