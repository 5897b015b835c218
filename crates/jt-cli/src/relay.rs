//! Duplex relay between a terminal connection and the local console
//!
//! The relay has two halves that never block each other:
//!
//! - a receive task ([`receive_loop`]) that owns the read half, decodes frames
//!   and hands [`RelayEvent`]s to a channel;
//! - an [`InputSender`] that encodes input lines and writes them through the
//!   shared write half from whichever task calls it.
//!
//! Events are rendered by [`present`], which writes output to the console and
//! publishes a [`LinkStatus`] the session controller can wait on.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use jt_core::traits::{FrameSink, FrameSource};
use jt_core::{ConnectionError, SessionError};
use jt_protocol::{decode, encode, WireMessage};

/// Channel capacity for decoded relay events.
///
/// Output arrives in bursts when a command prints a lot; 256 frames lets the
/// receive task stay ahead of a console that is briefly slow to write.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something the receive loop observed on the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Server reported the terminal is ready
    Ready,
    /// Output to write verbatim
    Output(String),
    /// Receive loop stopped
    Terminated(Termination),
}

/// Why the receive loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Server sent a disconnect message
    Disconnected,
    /// Connection closed cleanly
    Closed,
    /// Connection failed or closed abnormally
    Failed(String),
}

/// Link state as seen by the presenter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStatus {
    /// Ready signal received
    pub ready: bool,
    /// Set once the receive loop has stopped
    pub terminated: Option<Termination>,
    /// Number of output frames written so far
    pub output_frames: u64,
}

/// Read frames until the terminal disconnects or the connection ends
///
/// Malformed frames are logged and dropped. Once this returns, no further
/// receive is attempted on `source`.
pub async fn receive_loop(
    mut source: Box<dyn FrameSource>,
    events: mpsc::Sender<RelayEvent>,
) -> Termination {
    let termination = loop {
        let frame = match source.next_text().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!("Terminal connection closed");
                break Termination::Closed;
            }
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break Termination::Failed(e.to_string());
            }
        };

        let message = match decode(&frame) {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::trace!(frame = %frame, "Dropping frame without payload");
                continue;
            }
            Err(e) => {
                tracing::warn!("Failed to parse message: {}", e);
                continue;
            }
        };

        let event = match message {
            WireMessage::Stdout(text) => RelayEvent::Output(text),
            WireMessage::Setup(_) => {
                tracing::info!("Terminal ready");
                RelayEvent::Ready
            }
            WireMessage::Disconnect(_) => {
                tracing::info!("Terminal disconnected");
                break Termination::Disconnected;
            }
            ignored @ (WireMessage::Stdin(_) | WireMessage::Unrecognized { .. }) => {
                tracing::trace!(tag = ignored.tag(), "Ignoring message");
                continue;
            }
        };

        if events.send(event).await.is_err() {
            tracing::debug!("Relay event receiver dropped");
            return Termination::Closed;
        }
    };

    let _ = events
        .send(RelayEvent::Terminated(termination.clone()))
        .await;
    termination
}

/// Run [`receive_loop`] as its own task
pub fn spawn_receiver(
    source: Box<dyn FrameSource>,
) -> (JoinHandle<Termination>, mpsc::Receiver<RelayEvent>) {
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let handle = tokio::spawn(receive_loop(source, event_tx));
    (handle, event_rx)
}

/// Render relay events to the console and publish link status
///
/// Always marks the link terminated before returning, including when the
/// console write fails or the event channel closes without a final event.
pub async fn present<W>(
    mut events: mpsc::Receiver<RelayEvent>,
    mut writer: W,
    status: watch::Sender<LinkStatus>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let result = render(&mut events, &mut writer, &status).await;

    status.send_if_modified(|s| {
        if s.terminated.is_some() {
            return false;
        }
        s.terminated = Some(match &result {
            Ok(()) => Termination::Closed,
            Err(e) => Termination::Failed(format!("console write failed: {}", e)),
        });
        true
    });

    result
}

async fn render<W>(
    events: &mut mpsc::Receiver<RelayEvent>,
    writer: &mut W,
    status: &watch::Sender<LinkStatus>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = events.recv().await {
        match event {
            RelayEvent::Output(text) => {
                writer.write_all(text.as_bytes()).await?;
                writer.flush().await?;
                status.send_modify(|s| s.output_frames += 1);
            }
            RelayEvent::Ready => status.send_modify(|s| s.ready = true),
            RelayEvent::Terminated(reason) => {
                status.send_modify(|s| s.terminated = Some(reason));
                break;
            }
        }
    }
    writer.flush().await
}

/// Sends console input to the terminal
///
/// Cloneable and safe to use from any task while the receive loop runs.
#[derive(Clone)]
pub struct InputSender {
    sink: Arc<dyn FrameSink>,
}

impl InputSender {
    /// Wrap the write half of a connection
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self { sink }
    }

    /// Send one line of input
    ///
    /// A trailing newline is appended when missing since the remote shell
    /// reads line-buffered input.
    pub async fn send(&self, text: &str) -> Result<(), SessionError> {
        let line = terminate_line(text);
        let frame = encode(&WireMessage::stdin(line))?;
        tracing::debug!(bytes = frame.len(), "Sending input");
        self.sink.send_text(frame).await.map_err(SessionError::Send)
    }

    /// Close the underlying connection
    pub async fn close(&self) -> Result<(), ConnectionError> {
        self.sink.close().await
    }
}

impl fmt::Debug for InputSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSender").finish_non_exhaustive()
    }
}

/// Append `\n` unless the text already ends with one
pub fn terminate_line(text: &str) -> Cow<'_, str> {
    if text.ends_with('\n') {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{}\n", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_connection, stdout_frame};
    use std::sync::atomic::Ordering;

    async fn relay_to_string(script: Vec<&str>) -> (String, Termination, usize) {
        let (connection, recorder) = fake_connection(script, false);
        let (_sink, source) = connection.into_split();
        let (handle, events) = spawn_receiver(source);
        let (status_tx, _status_rx) = watch::channel(LinkStatus::default());

        let mut output = Vec::new();
        present(events, &mut output, status_tx).await.unwrap();
        let termination = handle.await.unwrap();

        (
            String::from_utf8(output).unwrap(),
            termination,
            recorder.receives.load(Ordering::SeqCst),
        )
    }

    #[tokio::test]
    async fn test_scripted_session_output() {
        let (output, termination, receives) = relay_to_string(vec![
            r#"["setup"]"#,
            r#"["stdout","a\n"]"#,
            r#"["stdout","b\n"]"#,
            r#"["disconnect"]"#,
            r#"["stdout","never\n"]"#,
        ])
        .await;

        assert_eq!(output, "a\nb\n");
        assert_eq!(termination, Termination::Disconnected);
        // No receive after the disconnect frame
        assert_eq!(receives, 4);
    }

    #[tokio::test]
    async fn test_malformed_frames_are_dropped() {
        let (output, termination, _) = relay_to_string(vec![
            "garbage",
            "[]",
            r#"["stdout"]"#,
            r#"{"stdout": "x"}"#,
            r#"["stdout", 5]"#,
            r#"["resize", 24, 80]"#,
            r#"["stdin", "echo"]"#,
            r#"["stdout","ok"]"#,
        ])
        .await;

        assert_eq!(output, "ok");
        assert_eq!(termination, Termination::Closed);
    }

    #[tokio::test]
    async fn test_output_is_verbatim() {
        let (output, _, _) = relay_to_string(vec![
            r#"["stdout","$ "]"#,
            r#"["stdout","no newline"]"#,
            r#"["stdout","\r\n"]"#,
        ])
        .await;
        assert_eq!(output, "$ no newline\r\n");
    }

    #[tokio::test]
    async fn test_status_tracks_ready_and_output() {
        let (connection, _recorder) = fake_connection(
            vec![r#"["setup", {}]"#, stdout_frame("x").as_str(), r#"["disconnect", 0]"#],
            false,
        );
        let (_sink, source) = connection.into_split();
        let (_handle, events) = spawn_receiver(source);
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());

        present(events, tokio::io::sink(), status_tx).await.unwrap();

        let status = status_rx.borrow().clone();
        assert!(status.ready);
        assert_eq!(status.output_frames, 1);
        assert_eq!(status.terminated, Some(Termination::Disconnected));
    }

    #[tokio::test]
    async fn test_abnormal_close_terminates_with_failure() {
        let (connection, _recorder) = fake_connection(vec![r#"["stdout","a"]"#], false);
        let (_sink, source) = connection.into_split();
        let source = crate::testing::FailingSource::after(source);
        let (tx, mut rx) = mpsc::channel(8);

        let termination = receive_loop(Box::new(source), tx).await;
        assert!(matches!(termination, Termination::Failed(_)));
        assert_eq!(rx.recv().await, Some(RelayEvent::Output("a".to_string())));
        assert!(matches!(
            rx.recv().await,
            Some(RelayEvent::Terminated(Termination::Failed(_)))
        ));
    }

    #[tokio::test]
    async fn test_send_appends_newline() {
        let (connection, recorder) = fake_connection(vec![], true);
        let (sink, _source) = connection.into_split();
        let input = InputSender::new(sink);

        input.send("ls").await.unwrap();
        input.send("ls\n").await.unwrap();

        assert_eq!(
            recorder.sent(),
            vec![r#"["stdin","ls\n"]"#.to_string(), r#"["stdin","ls\n"]"#.to_string()]
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_send_error() {
        let (connection, recorder) = fake_connection(vec![], true);
        recorder.fail_sends();
        let (sink, _source) = connection.into_split();

        let err = InputSender::new(sink).send("ls").await.unwrap_err();
        assert!(matches!(err, SessionError::Send(_)));
    }

    #[tokio::test]
    async fn test_concurrent_sends_from_many_tasks() {
        let (connection, recorder) = fake_connection(vec![], true);
        let (sink, _source) = connection.into_split();
        let input = InputSender::new(sink);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let input = input.clone();
                tokio::spawn(async move { input.send(&format!("echo {}", i)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut sent = recorder.sent();
        sent.sort();
        assert_eq!(sent.len(), 8);
        assert!(sent.iter().all(|f| decode(f).unwrap().is_some()));
    }

    #[test]
    fn test_terminate_line() {
        assert_eq!(terminate_line("ls"), "ls\n");
        assert_eq!(terminate_line("ls\n"), "ls\n");
        assert_eq!(terminate_line(""), "\n");
        assert!(matches!(terminate_line("pwd\n"), Cow::Borrowed(_)));
    }
}
