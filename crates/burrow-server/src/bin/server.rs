//! Burrow server binary
//!
//! Run with: cargo run --bin burrow-server -- --port 9001

use std::path::PathBuf;

use anyhow::Context;
use burrow_server::{Config, LogFormat, Server, logging};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides the configuration file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Log format (json or text)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Log file path, rotated daily
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(file) = self.log_file {
            config.logging.file = Some(file);
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;
    config.validate().context("Invalid configuration")?;

    let _log_guard = logging::init(&config.logging).context("Failed to initialize logging")?;

    info!(
        event = "server_starting",
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.bind_address,
        port = config.port,
        log_format = ?config.logging.format,
        log_file = ?config.logging.file,
        audit_enabled = config.logging.audit_enabled,
        "Starting burrow server"
    );

    let server = Server::new(config)?;
    if let Err(e) = server.run().await {
        error!(event = "server_error", error = %e, "Server encountered an error");
        return Err(e.into());
    }

    Ok(())
}
