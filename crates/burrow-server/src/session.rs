//! Session state machine
//!
//! One session per accepted connection:
//!
//! ```text
//! AwaitingUnlock -> Authenticating -> AwaitingMode -> {Downloading | Uploading | Listing} -> Closed
//! ```
//!
//! Every transition is one-shot. Any failure moves straight to `Closed`. The
//! only failure with a wire representation is a resource error before the
//! data phase, reported as a single ERROR status byte by the handler layer.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use burrow_core::protocol::{UNLOCK_SIGNAL, codec};
use burrow_core::{Error, Mode};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::audit::SessionInfo;
use crate::fs::{Filesystem, LocalFilesystem};
use crate::handlers::{self, Download, List, Served, Upload};
use crate::path::{PathResolver, UsernameHint};

/// Read-only collaborators shared by every session
#[derive(Clone)]
pub struct Services {
    fs: Arc<dyn Filesystem>,
    resolver: PathResolver,
    audit: bool,
}

impl Services {
    /// Bundle a filesystem and a path resolver
    pub fn new(fs: Arc<dyn Filesystem>, resolver: PathResolver) -> Self {
        Self {
            fs,
            resolver,
            audit: true,
        }
    }

    /// Local filesystem, password database and process environment
    pub fn system() -> Self {
        Self::new(Arc::new(LocalFilesystem), PathResolver::system())
    }

    /// Enable or disable audit events
    #[must_use]
    pub fn with_audit(mut self, enabled: bool) -> Self {
        self.audit = enabled;
        self
    }

    /// Filesystem collaborator
    pub fn fs(&self) -> &dyn Filesystem {
        self.fs.as_ref()
    }

    /// Path resolver
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("resolver", &self.resolver)
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

/// Where a session is in its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the unlock byte
    AwaitingUnlock,
    /// Waiting for the username frame
    Authenticating,
    /// Waiting for the mode byte
    AwaitingMode,
    /// Serving a download
    Downloading,
    /// Serving an upload
    Uploading,
    /// Serving a listing
    Listing,
    /// Connection shut down
    Closed,
}

impl SessionState {
    fn serving(mode: Mode) -> Self {
        match mode {
            Mode::Download => SessionState::Downloading,
            Mode::Upload => SessionState::Uploading,
            Mode::List => SessionState::Listing,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::AwaitingUnlock => "awaiting_unlock",
            SessionState::Authenticating => "authenticating",
            SessionState::AwaitingMode => "awaiting_mode",
            SessionState::Downloading => "downloading",
            SessionState::Uploading => "uploading",
            SessionState::Listing => "listing",
            SessionState::Closed => "closed",
        })
    }
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// The unlock gate was not passed; nothing was written back
    Locked,
    /// OK was sent and the operation finished
    Completed {
        /// Operation served
        mode: Mode,
        /// File bytes moved, or entries listed
        bytes: u64,
    },
    /// ERROR was sent before the data phase
    Refused {
        /// Operation requested
        mode: Mode,
        /// Local cause, never sent to the client
        error: Error,
    },
    /// The connection was dropped without further protocol bytes
    Aborted {
        /// State the session was in when it failed
        state: SessionState,
        /// Cause
        error: Error,
    },
}

impl SessionOutcome {
    /// Short label for logs and audit records
    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Locked => "locked",
            SessionOutcome::Completed { .. } => "completed",
            SessionOutcome::Refused { .. } => "refused",
            SessionOutcome::Aborted { .. } => "aborted",
        }
    }
}

/// One client connection
pub struct Session<S> {
    stream: S,
    hint: UsernameHint,
    state: SessionState,
    info: SessionInfo,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Take ownership of a freshly accepted connection
    pub fn new(stream: S, peer: Option<SocketAddr>, audit: bool) -> Self {
        Self {
            stream,
            hint: UsernameHint::default(),
            state: SessionState::AwaitingUnlock,
            info: SessionInfo::new(peer, audit),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion and shut the connection down
    ///
    /// Leaves the session in [`SessionState::Closed`] whatever the outcome.
    pub async fn run(&mut self, services: &Services) -> SessionOutcome {
        let span = info_span!("session", session_id = %self.info.session_id);
        async move {
            self.info.connection_established();

            let outcome = self.drive(services).await;

            self.state = SessionState::Closed;
            if let Err(e) = self.stream.shutdown().await {
                debug!(error = %e, "Shutdown after session failed");
            }

            match &outcome {
                SessionOutcome::Locked => {
                    info!("Bad or missing unlock signal, connection dropped");
                }
                SessionOutcome::Completed { mode, bytes } => {
                    info!(%mode, bytes, "Session done");
                }
                SessionOutcome::Refused { mode, error } => {
                    info!(%mode, error = %error, "Request refused");
                }
                SessionOutcome::Aborted { state, error } => {
                    warn!(%state, kind = error.kind(), error = %error, "Session aborted");
                }
            }
            self.info.connection_closed(outcome.label());

            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self, services: &Services) -> SessionOutcome {
        match codec::read_byte(&mut self.stream).await {
            Ok(UNLOCK_SIGNAL) => debug!("Unlock signal received"),
            Ok(other) => {
                self.info.unlock_rejected(Some(other));
                return SessionOutcome::Locked;
            }
            Err(_) => {
                self.info.unlock_rejected(None);
                return SessionOutcome::Locked;
            }
        }

        self.state = SessionState::Authenticating;
        let name = match codec::read_frame(&mut self.stream).await {
            Ok(name) => name,
            Err(error) => return self.abort(error),
        };
        self.hint = UsernameHint::from_wire(&name);
        self.info.authenticated(self.hint.to_string());

        self.state = SessionState::AwaitingMode;
        let mode = match codec::read_byte(&mut self.stream)
            .await
            .and_then(Mode::try_from)
        {
            Ok(mode) => mode,
            Err(error) => return self.abort(error),
        };

        self.state = SessionState::serving(mode);
        let served = match mode {
            Mode::Download => {
                handlers::serve::<Download, S>(&mut self.stream, &self.hint, services).await
            }
            Mode::Upload => {
                handlers::serve::<Upload, S>(&mut self.stream, &self.hint, services).await
            }
            Mode::List => handlers::serve::<List, S>(&mut self.stream, &self.hint, services).await,
        };

        match served {
            Ok(Served::Completed { path, bytes }) => {
                self.info.file_operation(mode, &path, Some(bytes), None);
                SessionOutcome::Completed { mode, bytes }
            }
            Ok(Served::Refused { path, error }) => {
                self.info
                    .file_operation(mode, &path, None, Some(error.to_string()));
                SessionOutcome::Refused { mode, error }
            }
            Err(error) => self.abort(error),
        }
    }

    fn abort(&self, error: Error) -> SessionOutcome {
        SessionOutcome::Aborted {
            state: self.state,
            error,
        }
    }
}

/// Serve one connection: the single entry point used by the acceptor
pub async fn run_session<S>(
    stream: S,
    peer: Option<SocketAddr>,
    services: &Services,
) -> SessionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut session = Session::new(stream, peer, services.audit);
    session.run(services).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{StaticEnvironment, StaticIdentity};
    use tokio::io::duplex;

    fn services() -> Services {
        let resolver = PathResolver::new(
            Arc::new(StaticIdentity::new()),
            Arc::new(StaticEnvironment::new()),
        );
        Services::new(Arc::new(LocalFilesystem), resolver).with_audit(false)
    }

    #[tokio::test]
    async fn test_session_starts_awaiting_unlock() {
        let (_client, server) = duplex(64);
        let session = Session::new(server, None, false);
        assert_eq!(session.state(), SessionState::AwaitingUnlock);
    }

    #[tokio::test]
    async fn test_locked_session_ends_closed() {
        let (mut client, server) = duplex(64);
        client.write_all(&[0x07]).await.unwrap();

        let mut session = Session::new(server, None, false);
        let outcome = session.run(&services()).await;

        assert!(matches!(outcome, SessionOutcome::Locked));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_aborted_session_reports_state_and_ends_closed() {
        let (mut client, server) = duplex(64);
        client.write_all(&[0x01, 0, 0, 0, 1, b'a', b'Q']).await.unwrap();

        let mut session = Session::new(server, None, false);
        let outcome = session.run(&services()).await;

        assert!(matches!(
            outcome,
            SessionOutcome::Aborted {
                state: SessionState::AwaitingMode,
                ..
            }
        ));
        assert_eq!(outcome.label(), "aborted");
        assert_eq!(session.state(), SessionState::Closed);
    }
}
