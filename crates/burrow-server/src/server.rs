//! Connection acceptor
//!
//! Binds the listener and hands every accepted connection to its own tokio
//! task running [`run_session`]. Sessions share nothing but the read-only
//! [`Services`].

use std::sync::Arc;

use burrow_core::{Error, Result};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::Config;
use crate::session::{Services, run_session};

/// Burrow server
#[derive(Debug)]
pub struct Server {
    config: Arc<Config>,
    services: Services,
}

impl Server {
    /// Create a server over the local filesystem and system accounts
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let services = Services::system().with_audit(config.logging.audit_enabled);

        Ok(Self {
            config: Arc::new(config),
            services,
        })
    }

    /// Replace the collaborators sessions use
    #[must_use]
    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    /// Server configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind the configured address and serve forever
    pub async fn run(self) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(event = "bind_failed", address = %addr, error = %e, "Failed to bind listener");
            Error::Io(e)
        })?;

        self.serve(listener).await
    }

    /// Accept connections from an already bound listener, forever
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            event = "server_listening",
            address = %local_addr,
            "Server running, idle mode"
        );

        let services = Arc::new(self.services);
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(event = "accept_failed", error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let services = Arc::clone(&services);
            tokio::spawn(async move {
                run_session(stream, Some(peer), &services).await;
            });
        }
    }
}
