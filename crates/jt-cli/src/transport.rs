//! WebSocket transport for terminal connections
//!
//! The connection target is derived from the server endpoint:
//! `http` becomes `ws`, `https` becomes `wss`, and the path is replaced by
//! `/terminals/websocket/{name}`. The token travels as a query parameter
//! because browsers (and so the server) cannot set headers on WebSocket
//! upgrades.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use jt_core::traits::{Connection, Connector, FrameSink, FrameSource};
use jt_core::{ConnectionError, Credential, Endpoint, TerminalName};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Derive the WebSocket URL of a terminal
pub fn terminal_socket_url(
    endpoint: &Endpoint,
    terminal: &TerminalName,
    credential: &Credential,
) -> Result<Url, ConnectionError> {
    let mut url = endpoint.url().clone();

    let scheme = if endpoint.is_secure() { "wss" } else { "ws" };
    url.set_scheme(scheme).map_err(|()| {
        ConnectionError::InvalidTarget(format!("cannot use {} for {}", scheme, endpoint))
    })?;

    url.path_segments_mut()
        .map_err(|()| ConnectionError::InvalidTarget(format!("{} cannot have a path", endpoint)))?
        .clear()
        .extend(["terminals", "websocket", terminal.as_str()]);

    url.set_query(None);
    url.set_fragment(None);
    if let Some(token) = credential.token() {
        url.query_pairs_mut().append_pair("token", token);
    }

    Ok(url)
}

/// Render a connection target without its query string, for logs and prompts
pub fn display_target(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

/// Dials terminal WebSockets with `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        terminal: &TerminalName,
        credential: &Credential,
    ) -> Result<Connection, ConnectionError> {
        let url = terminal_socket_url(endpoint, terminal, credential)?;
        let shown = display_target(&url);
        tracing::info!(url = %shown, "Connecting to terminal");

        let (stream, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| ConnectionError::ConnectFailed {
                    url: shown,
                    reason: e.to_string(),
                })?;

        let (sink, source) = stream.split();
        Ok(Connection::new(
            WebSocketSink {
                inner: Mutex::new(sink),
            },
            WebSocketSource { inner: source },
        ))
    }
}

/// Write half; writes are serialized, reads are never blocked by them
struct WebSocketSink {
    inner: Mutex<SplitSink<WsStream, WsMessage>>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&self, frame: String) -> Result<(), ConnectionError> {
        let mut sink = self.inner.lock().await;
        sink.send(WsMessage::Text(frame)).await.map_err(|e| match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => ConnectionError::Closed,
            other => ConnectionError::SendFailed(other.to_string()),
        })
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        let mut sink = self.inner.lock().await;
        match sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(ConnectionError::SendFailed(e.to_string())),
        }
    }
}

/// Read half
struct WebSocketSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn next_text(&mut self) -> Result<Option<String>, ConnectionError> {
        while let Some(message) = self.inner.next().await {
            match message {
                Ok(WsMessage::Text(text)) => return Ok(Some(text)),
                Ok(WsMessage::Close(frame)) => return close_outcome(frame),
                Ok(WsMessage::Binary(data)) => {
                    tracing::debug!(bytes = data.len(), "Ignoring binary frame");
                }
                // Ping/pong are answered by tungstenite itself
                Ok(_) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(None),
                Err(e) => return Err(ConnectionError::AbnormalClose(e.to_string())),
            }
        }
        Ok(None)
    }
}

/// Normal and going-away closes are expected; anything else is reported
fn close_outcome(frame: Option<CloseFrame<'_>>) -> Result<Option<String>, ConnectionError> {
    match frame {
        Some(frame) if !matches!(frame.code, CloseCode::Normal | CloseCode::Away) => {
            Err(ConnectionError::AbnormalClose(format!(
                "close code {}: {}",
                u16::from(frame.code),
                frame.reason
            )))
        }
        _ => Ok(None),
    }
}
