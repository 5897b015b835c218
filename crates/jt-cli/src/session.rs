//! Session controller
//!
//! [`ClientSession`] owns everything about one terminal: the server endpoint,
//! the credential, the bound terminal name and the live link. A session moves
//! through these steps once:
//!
//! 1. bind a terminal ([`ClientSession::resolve`] attaches or provisions);
//! 2. [`ClientSession::connect`], which starts the relay tasks;
//! 3. run one input mode ([`ClientSession::run_single_shot`] or
//!    [`ClientSession::run_interactive`]);
//! 4. [`ClientSession::close`], which is safe to call any number of times.
//!
//! [`ClientSession::run`] performs the whole sequence.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use jt_core::config::{ClientConfig, Timings};
use jt_core::traits::{Connector, TerminalProvisioner};
use jt_core::{Credential, Endpoint, SessionError, TerminalName};

use crate::output::{banner, print_info, print_success, PROMPT};
use crate::relay::{self, InputSender, LinkStatus, Termination};
use crate::transport::{display_target, terminal_socket_url};

/// Upper bound for the relay tasks to wind down after the socket is closed
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How console input is consumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Read and send lines until the exit keyword or end of input
    Interactive,
    /// Send these words as one command, then exit
    SingleShot(Vec<String>),
}

impl Mode {
    /// Single-shot when any trailing arguments were given
    pub fn from_args(args: Vec<String>) -> Self {
        if args.is_empty() {
            Self::Interactive
        } else {
            Self::SingleShot(args)
        }
    }
}

/// Local console streams used by [`ClientSession::run`]
#[derive(Debug)]
pub struct Console<R, W, P> {
    /// Line input, only read in interactive mode
    pub input: R,
    /// Destination for terminal output
    pub output: W,
    /// Destination for the banner and prompts
    pub prompt: P,
}

#[derive(Debug)]
enum LinkState {
    Idle,
    Open(Link),
    Closed,
}

/// Live connection plus the relay tasks serving it
#[derive(Debug)]
struct Link {
    input: InputSender,
    status: watch::Receiver<LinkStatus>,
    receiver: JoinHandle<Termination>,
    presenter: JoinHandle<io::Result<()>>,
}

impl Link {
    fn termination(&self) -> Option<Termination> {
        self.status.borrow().terminated.clone()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.receiver.abort();
        self.presenter.abort();
    }
}

/// A client's view of one remote terminal
#[derive(Debug)]
pub struct ClientSession {
    endpoint: Endpoint,
    credential: Credential,
    terminal: Option<TerminalName>,
    link: LinkState,
    timings: Timings,
    exit_command: String,
    exit_keyword: String,
}

impl ClientSession {
    /// Create an unbound session with the default exit words
    pub fn new(endpoint: Endpoint, credential: Credential, timings: Timings) -> Self {
        let defaults = ClientConfig::default();
        Self {
            endpoint,
            credential,
            terminal: None,
            link: LinkState::Idle,
            timings,
            exit_command: defaults.exit_command,
            exit_keyword: defaults.exit_keyword,
        }
    }

    /// Take timings and exit words from a configuration
    pub fn from_config(endpoint: Endpoint, credential: Credential, config: &ClientConfig) -> Self {
        Self {
            exit_command: config.exit_command.clone(),
            exit_keyword: config.exit_keyword.clone(),
            ..Self::new(endpoint, credential, config.timings)
        }
    }

    /// Bound terminal, if any
    pub fn terminal(&self) -> Option<&TerminalName> {
        self.terminal.as_ref()
    }

    /// Whether a link is currently open
    pub fn is_connected(&self) -> bool {
        matches!(self.link, LinkState::Open(_))
    }

    /// Bind an existing terminal without provisioning
    pub fn attach(&mut self, terminal: TerminalName) -> Result<(), SessionError> {
        if let Some(existing) = &self.terminal {
            return Err(SessionError::AlreadyBound(existing.to_string()));
        }
        tracing::debug!(terminal = %terminal, "Attaching to existing terminal");
        self.terminal = Some(terminal);
        Ok(())
    }

    /// Create a new terminal and bind it
    pub async fn provision(
        &mut self,
        provisioner: &dyn TerminalProvisioner,
    ) -> Result<&TerminalName, SessionError> {
        if let Some(existing) = &self.terminal {
            return Err(SessionError::AlreadyBound(existing.to_string()));
        }
        let terminal = provisioner
            .provision(&self.endpoint, &self.credential)
            .await?;
        Ok(self.terminal.insert(terminal))
    }

    /// Bind `existing` when given, otherwise provision a new terminal
    pub async fn resolve(
        &mut self,
        existing: Option<TerminalName>,
        provisioner: &dyn TerminalProvisioner,
    ) -> Result<&TerminalName, SessionError> {
        match existing {
            Some(terminal) => {
                print_info(&format!("Using existing terminal: {}", terminal));
                self.attach(terminal)?;
            }
            None => {
                let terminal = self.provision(provisioner).await?;
                print_success(&format!("Created terminal: {}", terminal));
            }
        }
        self.terminal.as_ref().ok_or(SessionError::Unbound)
    }

    /// Connect to the bound terminal and start relaying output to `output`
    pub async fn connect<W>(
        &mut self,
        connector: &dyn Connector,
        output: W,
    ) -> Result<(), SessionError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        match self.link {
            LinkState::Idle => {}
            LinkState::Open(_) => return Err(SessionError::AlreadyConnected),
            LinkState::Closed => return Err(SessionError::Closed),
        }
        let terminal = self.terminal.as_ref().ok_or(SessionError::Unbound)?;

        let connection = connector
            .connect(&self.endpoint, terminal, &self.credential)
            .await?;
        let (sink, source) = connection.into_split();

        let (receiver, events) = relay::spawn_receiver(source);
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        let presenter = tokio::spawn(relay::present(events, output, status_tx));

        tracing::info!(terminal = %terminal, "Connected to terminal");
        self.link = LinkState::Open(Link {
            input: InputSender::new(sink),
            status: status_rx,
            receiver,
            presenter,
        });
        Ok(())
    }

    /// Send one line of input to the terminal
    pub async fn send(&self, text: &str) -> Result<(), SessionError> {
        self.open_link()?.input.send(text).await
    }

    /// Send `args` joined by spaces as a single command and wait for its output
    ///
    /// The wait ends when the terminal disconnects, when output has been quiet
    /// for the idle interval after at least one frame, or after the command
    /// grace period, whichever comes first. Output is not considered settled
    /// before half the grace period has passed, since the first frames are
    /// usually just the shell echoing the command. Console input is never read.
    pub async fn run_single_shot(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let link = self.open_link()?;
        let mut status = link.status.clone();
        let baseline = status.borrow_and_update().output_frames;

        let command = args.join(" ");
        tracing::debug!(command = %command, "Running single command");
        link.input.send(&command).await?;

        tokio::select! {
            _ = timeout(
                self.timings.command_grace,
                settle_output(
                    &mut status,
                    baseline,
                    self.timings.output_idle,
                    self.timings.command_grace / 2,
                ),
            ) => {}
            _ = cancel.cancelled() => tracing::debug!("Interrupted"),
        }
        Ok(())
    }

    /// Relay console lines to the terminal until told to stop
    ///
    /// Stops on the exit keyword (which is not forwarded), end of input,
    /// cancellation, or when the terminal goes away. A failed send ends the
    /// loop with an error.
    pub async fn run_interactive<R, P>(
        &self,
        input: R,
        prompt: &mut P,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError>
    where
        R: AsyncBufRead + Unpin,
        P: AsyncWrite + Unpin,
    {
        let link = self.open_link()?;
        let mut status = link.status.clone();

        if !wait_until_ready(&mut status, self.timings.startup_grace).await {
            tracing::debug!(
                "No ready signal within {:?}, continuing",
                self.timings.startup_grace
            );
        }

        prompt
            .write_all(banner(&self.exit_keyword).as_bytes())
            .await?;

        let mut lines = input.lines();
        loop {
            if status.borrow().terminated.is_some() {
                tracing::info!("Terminal closed by server");
                break;
            }

            prompt.write_all(PROMPT.as_bytes()).await?;
            prompt.flush().await?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = cancel.cancelled() => {
                    tracing::debug!("Interrupted");
                    break;
                }
                _ = wait_for_termination(status.clone()) => {
                    tracing::info!("Terminal closed by server");
                    break;
                }
            };

            let Some(line) = line else {
                tracing::debug!("End of input");
                break;
            };

            if line == self.exit_keyword {
                break;
            }

            if let Err(e) = link.input.send(&line).await {
                tracing::warn!("Failed to send command: {}", e);
                return Err(e);
            }

            tokio::time::sleep(self.timings.input_pause).await;
        }

        Ok(())
    }

    /// Tear the link down
    ///
    /// Sends the exit command, gives the terminal the exit grace period to
    /// disconnect, then closes the socket. Failures are logged and otherwise
    /// ignored. Calling this without an open link does nothing.
    pub async fn close(&mut self) {
        let mut link = match std::mem::replace(&mut self.link, LinkState::Closed) {
            LinkState::Open(link) => link,
            other => {
                self.link = other;
                return;
            }
        };

        let grace = self.timings.exit_grace;
        if link.termination().is_none() {
            match link.input.send(&self.exit_command).await {
                Ok(()) => {
                    if !wait_terminated(&mut link.status, grace).await {
                        tracing::debug!("Terminal did not disconnect within {:?}", grace);
                    }
                }
                Err(e) => tracing::warn!("Failed to send exit command: {}", e),
            }
        }

        if let Err(e) = link.input.close().await {
            tracing::warn!("Failed to close connection: {}", e);
        }

        if timeout(DRAIN_TIMEOUT, &mut link.receiver).await.is_err() {
            tracing::warn!("Receive loop did not stop after close");
        }
        match timeout(DRAIN_TIMEOUT, &mut link.presenter).await {
            Ok(Ok(Err(e))) => tracing::warn!("Console output failed: {}", e),
            Ok(_) => {}
            Err(_) => tracing::warn!("Output relay did not stop after close"),
        }

        tracing::info!("Session closed");
    }

    /// Bind, connect, run the input mode, and tear down
    ///
    /// Binding and connecting errors are returned before any link exists, and
    /// cancellation during either step returns [`SessionError::Interrupted`].
    /// Once connected, teardown runs whatever way the input mode ends.
    pub async fn run<R, W, P>(
        &mut self,
        mode: Mode,
        existing: Option<TerminalName>,
        provisioner: &dyn TerminalProvisioner,
        connector: &dyn Connector,
        console: Console<R, W, P>,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        P: AsyncWrite + Unpin,
    {
        // Neither step has its own timeout, so only cancellation can cut them short
        let resolved = tokio::select! {
            resolved = self.resolve(existing, provisioner) => {
                resolved.map(|terminal| terminal.clone())
            }
            _ = cancel.cancelled() => Err(SessionError::Interrupted),
        };
        let terminal = resolved?;

        if let Ok(url) = terminal_socket_url(&self.endpoint, &terminal, &self.credential) {
            print_info(&format!("Connecting to: {}", display_target(&url)));
        }
        tokio::select! {
            connected = self.connect(connector, console.output) => connected?,
            _ = cancel.cancelled() => return Err(SessionError::Interrupted),
        }

        let Console {
            input, mut prompt, ..
        } = console;
        let result = match mode {
            Mode::SingleShot(args) => self.run_single_shot(&args, cancel).await,
            Mode::Interactive => self.run_interactive(input, &mut prompt, cancel).await,
        };

        self.close().await;
        result
    }

    fn open_link(&self) -> Result<&Link, SessionError> {
        match &self.link {
            LinkState::Open(link) => Ok(link),
            LinkState::Idle | LinkState::Closed => Err(SessionError::NotConnected),
        }
    }
}

/// Wait for the ready signal; `false` if it did not arrive in time
async fn wait_until_ready(status: &mut watch::Receiver<LinkStatus>, limit: Duration) -> bool {
    timeout(limit, status.wait_for(|s| s.ready || s.terminated.is_some()))
        .await
        .map(|seen| seen.map(|s| s.ready).unwrap_or(false))
        .unwrap_or(false)
}

/// Wait for the relay to stop; `false` if it did not stop in time
async fn wait_terminated(status: &mut watch::Receiver<LinkStatus>, limit: Duration) -> bool {
    timeout(limit, status.wait_for(|s| s.terminated.is_some()))
        .await
        .map(|seen| seen.is_ok())
        .unwrap_or(false)
}

async fn wait_for_termination(mut status: watch::Receiver<LinkStatus>) {
    let _ = status.wait_for(|s| s.terminated.is_some()).await;
}

/// Return once output has gone quiet after `baseline`, or the link stopped
///
/// Quiet periods ending before `earliest` do not count.
async fn settle_output(
    status: &mut watch::Receiver<LinkStatus>,
    baseline: u64,
    idle: Duration,
    earliest: Duration,
) {
    let settle_from = Instant::now() + earliest;
    loop {
        let (frames, terminated) = {
            let current = status.borrow_and_update();
            (current.output_frames, current.terminated.is_some())
        };
        if terminated {
            return;
        }

        let changed = if frames > baseline {
            let quiet_until = settle_from.max(Instant::now() + idle);
            match timeout_at(quiet_until, status.changed()).await {
                Ok(changed) => changed,
                // Quiet long enough
                Err(_) => return,
            }
        } else {
            status.changed().await
        };

        if changed.is_err() {
            return;
        }
    }
}
