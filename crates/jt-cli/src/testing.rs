//! In-memory connection fakes for relay and session tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use jt_core::traits::{Connection, Connector, FrameSink, FrameSource, TerminalProvisioner};
use jt_core::{ConnectionError, Credential, Endpoint, ProvisionError, TerminalName};
use jt_protocol::{encode, WireMessage};

/// Encode an output frame
pub(crate) fn stdout_frame(text: &str) -> String {
    encode(&WireMessage::stdout(text)).unwrap()
}

/// Shared view into a fake connection
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    sent: Arc<Mutex<Vec<String>>>,
    pub(crate) receives: Arc<AtomicUsize>,
    pub(crate) closes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    closed: Arc<Notify>,
}

impl Recorder {
    /// Frames written so far
    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Make every later send fail
    pub(crate) fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

struct RecordingSink {
    recorder: Recorder,
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_text(&self, frame: String) -> Result<(), ConnectionError> {
        if self.recorder.failing.load(Ordering::SeqCst) {
            return Err(ConnectionError::SendFailed("broken pipe".to_string()));
        }
        self.recorder.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        self.recorder.closed.notify_one();
        Ok(())
    }
}

struct ScriptedSource {
    frames: VecDeque<String>,
    hold_open: bool,
    recorder: Recorder,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn next_text(&mut self) -> Result<Option<String>, ConnectionError> {
        self.recorder.receives.fetch_add(1, Ordering::SeqCst);
        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }
        if self.hold_open {
            // Stay open like a live socket until the client closes it
            self.recorder.closed.notified().await;
        }
        Ok(None)
    }
}

/// Build a connection that replays `script`
///
/// With `hold_open`, the read half blocks after the script until the write
/// half is closed; otherwise it reports a clean close right away.
pub(crate) fn fake_connection(script: Vec<&str>, hold_open: bool) -> (Connection, Recorder) {
    let recorder = Recorder::default();
    let source = ScriptedSource {
        frames: script.into_iter().map(String::from).collect(),
        hold_open,
        recorder: recorder.clone(),
    };
    let sink = RecordingSink {
        recorder: recorder.clone(),
    };
    (Connection::new(sink, source), recorder)
}

/// Read half fed from a channel, for frames that arrive over time
struct ChannelSource {
    frames: mpsc::UnboundedReceiver<String>,
    recorder: Recorder,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn next_text(&mut self) -> Result<Option<String>, ConnectionError> {
        self.recorder.receives.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            frame = self.frames.recv() => Ok(frame),
            _ = self.recorder.closed.notified() => Ok(None),
        }
    }
}

/// Build a connection whose frames are pushed through the returned sender
///
/// The read half ends when the sender is dropped or the write half is closed.
pub(crate) fn channel_connection() -> (Connection, Recorder, mpsc::UnboundedSender<String>) {
    let recorder = Recorder::default();
    let (tx, rx) = mpsc::unbounded_channel();
    let source = ChannelSource {
        frames: rx,
        recorder: recorder.clone(),
    };
    let sink = RecordingSink {
        recorder: recorder.clone(),
    };
    (Connection::new(sink, source), recorder, tx)
}

/// Read half that fails once the wrapped source is exhausted
pub(crate) struct FailingSource {
    inner: Box<dyn FrameSource>,
}

impl FailingSource {
    pub(crate) fn after(inner: Box<dyn FrameSource>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FrameSource for FailingSource {
    async fn next_text(&mut self) -> Result<Option<String>, ConnectionError> {
        match self.inner.next_text().await? {
            Some(frame) => Ok(Some(frame)),
            None => Err(ConnectionError::AbnormalClose(
                "reset without closing handshake".to_string(),
            )),
        }
    }
}

/// Connector handing out one prepared connection
pub(crate) struct FakeConnector {
    connection: Mutex<Option<Connection>>,
    pub(crate) dials: AtomicUsize,
    fail: bool,
}

impl FakeConnector {
    pub(crate) fn new(connection: Connection) -> Self {
        Self {
            connection: Mutex::new(Some(connection)),
            dials: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub(crate) fn refusing() -> Self {
        Self {
            connection: Mutex::new(None),
            dials: AtomicUsize::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _endpoint: &Endpoint,
        terminal: &TerminalName,
        _credential: &Credential,
    ) -> Result<Connection, ConnectionError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let connection = if self.fail {
            None
        } else {
            self.connection.lock().unwrap().take()
        };
        connection.ok_or_else(|| ConnectionError::ConnectFailed {
            url: format!("ws://fake/terminals/websocket/{}", terminal),
            reason: "connection refused".to_string(),
        })
    }
}

/// Provisioner returning a fixed result
pub(crate) struct FakeProvisioner {
    status: Option<u16>,
    pub(crate) calls: AtomicUsize,
}

impl FakeProvisioner {
    /// Always succeeds with terminal "1"
    pub(crate) fn ok() -> Self {
        Self {
            status: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails with the given HTTP status
    pub(crate) fn failing(status: u16) -> Self {
        Self {
            status: Some(status),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TerminalProvisioner for FakeProvisioner {
    async fn provision(
        &self,
        _endpoint: &Endpoint,
        _credential: &Credential,
    ) -> Result<TerminalName, ProvisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.status {
            Some(status) => Err(ProvisionError::Status {
                status,
                body: "Internal Server Error".to_string(),
            }),
            None => Ok(TerminalName::from("1")),
        }
    }
}

/// Server that accepts requests and never answers
pub(crate) struct Unresponsive;

#[async_trait]
impl TerminalProvisioner for Unresponsive {
    async fn provision(
        &self,
        _endpoint: &Endpoint,
        _credential: &Credential,
    ) -> Result<TerminalName, ProvisionError> {
        std::future::pending().await
    }
}

#[async_trait]
impl Connector for Unresponsive {
    async fn connect(
        &self,
        _endpoint: &Endpoint,
        _terminal: &TerminalName,
        _credential: &Credential,
    ) -> Result<Connection, ConnectionError> {
        std::future::pending().await
    }
}
