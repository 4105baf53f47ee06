//! Error types shared by the burrow server and client
//!
//! Every error is terminal for the session it occurs in. Only resource and
//! internal failures have a wire representation (a single ERROR status byte
//! sent before the data phase); everything else is a silent disconnect.

use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::Mode;

/// Result type alias for burrow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Burrow error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed frame or unexpected byte where the wire contract is already broken
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Peer closed the connection or the socket faulted mid read/write
    #[error("Connection error: {0}")]
    Connection(String),

    /// A path could not be opened, created or enumerated
    ///
    /// The cause is logged locally and never sent to the client.
    #[error("Cannot access {}: {source}", path.display())]
    Resource {
        /// Resolved path of the resource
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// Failure unrelated to a specific open call (e.g. creating ancestors)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server answered an operation with the ERROR status
    #[error("Server refused {0} request")]
    Refused(Mode),

    /// Local I/O outside the wire contract
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a connection error from a socket failure
    pub fn connection(context: &str, err: &std::io::Error) -> Self {
        Error::Connection(format!("{context}: {err}"))
    }

    /// Create a resource error for a resolved path
    pub fn resource(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Resource {
            path: path.into(),
            source,
        }
    }

    /// Check whether this failure is reported to the client as an ERROR status
    ///
    /// Internal failures are treated as resource failures on the wire.
    pub fn is_wire_visible(&self) -> bool {
        matches!(self, Error::Resource { .. } | Error::Internal(_))
    }

    /// Short machine-readable label used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Protocol(_) => "protocol",
            Error::Connection(_) => "connection",
            Error::Resource { .. } => "resource",
            Error::Internal(_) => "internal",
            Error::Config(_) => "config",
            Error::Refused(_) => "refused",
            Error::Io(_) => "io",
        }
    }
}
