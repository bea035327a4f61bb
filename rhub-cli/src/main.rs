//! CLI bootstrap for the rhub connection broker.
//!
//! Parses operator-supplied endpoints, wires up logging, installs a
//! SIGINT/SIGTERM handler that requests graceful shutdown, and runs the
//! `Hub` to completion.

use anyhow::{Context, Result};
use clap::Parser;
use rhub::{BackendPath, FrontendAddr, Hub, HubConfig};
use std::time::Duration;
use tracing::{error, info};

/// Default backend socket path when `--backend` is not given.
const DEFAULT_BACKEND_PATH: &str = "/tmp/rhub.sock";

/// Default frontend address when `--frontend` is not given.
const DEFAULT_FRONTEND_ADDR: &str = "127.0.0.1:5555";

#[derive(Parser, Debug)]
#[command(name = "rhub", version, about = "Connection broker: rendezvous clients with named services")]
struct Cli {
    /// Public TCP endpoint clients connect to.
    #[arg(long, default_value = DEFAULT_FRONTEND_ADDR)]
    frontend: String,

    /// Local Unix domain socket path services register on.
    #[arg(long, default_value = DEFAULT_BACKEND_PATH)]
    backend: String,

    /// Listen backlog for the frontend TCP listener.
    #[arg(long)]
    backlog: Option<u32>,

    /// Accept-loop timeout in milliseconds, the cancellation checkpoint
    /// both listeners poll the stop flag at.
    #[arg(long)]
    accept_timeout_ms: Option<u64>,

    /// Raise log verbosity one notch (overridden by `RUST_LOG` if set).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Lower log verbosity one notch (overridden by `RUST_LOG` if set).
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,
}

fn init_logging(verbose: u8, quiet: u8) {
    use tracing_subscriber::EnvFilter;

    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
        return;
    }

    let level = match i64::from(verbose) - i64::from(quiet) {
        v if v <= -1 => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("rhub={level},rhub_broker={level},rhub_core={level}")))
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let frontend = FrontendAddr::parse(&cli.frontend)
        .with_context(|| format!("invalid --frontend value: {}", cli.frontend))?;
    let backend = BackendPath::new(&cli.backend)
        .with_context(|| format!("invalid --backend value: {}", cli.backend))?;

    let mut config = HubConfig::new(frontend, backend);
    if let Some(backlog) = cli.backlog {
        config = config.with_backlog(backlog);
    }
    if let Some(ms) = cli.accept_timeout_ms {
        config = config.with_accept_timeout(Duration::from_millis(ms));
    }

    let hub = Hub::new(config);
    let stop_handle = hub.stop_handle();

    ctrlc::set_handler(move || {
        info!("signal received, shutting down");
        stop_handle.stop();
    })
    .context("failed to install signal handler")?;

    let result = compio::runtime::Runtime::new()
        .context("failed to start async runtime")?
        .block_on(hub.run());

    match result {
        Ok(()) => {
            info!("hub stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "hub exited with an unhandled failure");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_without_flags() {
        let cli = Cli::parse_from(["rhub"]);
        assert_eq!(cli.frontend, DEFAULT_FRONTEND_ADDR);
        assert_eq!(cli.backend, DEFAULT_BACKEND_PATH);
        assert!(cli.backlog.is_none());
        assert!(cli.accept_timeout_ms.is_none());
    }

    #[test]
    fn explicit_overrides_are_captured() {
        let cli = Cli::parse_from([
            "rhub",
            "--frontend",
            "0.0.0.0:9999",
            "--backend",
            "/run/rhub.sock",
            "--backlog",
            "64",
            "--accept-timeout-ms",
            "250",
        ]);
        assert_eq!(cli.frontend, "0.0.0.0:9999");
        assert_eq!(cli.backend, "/run/rhub.sock");
        assert_eq!(cli.backlog, Some(64));
        assert_eq!(cli.accept_timeout_ms, Some(250));
    }

    #[test]
    fn malformed_frontend_is_rejected_before_any_socket_is_touched() {
        let frontend = FrontendAddr::parse("not-an-address");
        assert!(frontend.is_err());
    }
}
