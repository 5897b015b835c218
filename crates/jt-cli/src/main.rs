//! jterm CLI
//!
//! Opens a shell on a Jupyter server terminal:
//! - `jterm` provisions a terminal and starts an interactive shell
//! - `jterm --term 3` attaches to terminal 3 instead
//! - `jterm ls -la` runs a single command and exits

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jt_core::config::{self, ClientConfig};
use jt_core::{Credential, Endpoint, TerminalName};
use jterm::output::{print_error, print_info};
use jterm::provision::HttpProvisioner;
use jterm::session::{ClientSession, Console, Mode};
use jterm::transport::WebSocketConnector;

#[derive(Parser)]
#[command(name = "jterm")]
#[command(author, version, about = "Command-line client for Jupyter server terminals")]
struct Cli {
    /// Jupyter server URL
    #[arg(long, env = "JUPYTER_URL")]
    url: Option<String>,

    /// Jupyter server token
    #[arg(long, env = "JUPYTER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Attach to an existing terminal instead of creating one
    #[arg(long, value_name = "NAME")]
    term: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    /// Command to run instead of an interactive shell
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let code = match run(cli).await {
        Ok(()) => {
            print_info("Goodbye!");
            0
        }
        Err(e) => {
            print_error(&format!("{:#}", e));
            1
        }
    };

    // Exit directly: a pending console read would otherwise hold the runtime open
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load_client_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let (endpoint, credential) = server_settings(&cli, &config)?;

    let existing = cli
        .term
        .as_deref()
        .filter(|name| !name.is_empty())
        .map(TerminalName::from);
    let mode = Mode::from_args(cli.command);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    let console = Console {
        input: BufReader::new(tokio::io::stdin()),
        output: tokio::io::stdout(),
        prompt: tokio::io::stdout(),
    };

    let mut session = ClientSession::from_config(endpoint, credential, &config);
    session
        .run(
            mode,
            existing,
            &HttpProvisioner::new(),
            &WebSocketConnector,
            console,
            &cancel,
        )
        .await?;

    Ok(())
}

/// Flags and environment win over the config file
fn server_settings(cli: &Cli, config: &ClientConfig) -> Result<(Endpoint, Credential)> {
    let url = cli.url.as_deref().unwrap_or(&config.url);
    let endpoint = Endpoint::parse(url).with_context(|| format!("Invalid server URL '{}'", url))?;

    let token = cli.token.as_deref().unwrap_or(&config.token);
    Ok((endpoint, Credential::new(token)))
}
