//! Audit trail and session tracking
//!
//! Structured records of every connection, unlock attempt, username hint and
//! file operation, emitted through `tracing` so they end up in whichever
//! sink (text, JSON, rolling file) the binary configured.

use std::net::SocketAddr;
use std::path::Path;

use burrow_core::Mode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum AuditEvent {
    /// Connection accepted
    ConnectionEstablished {
        /// Session identifier
        session_id: Uuid,
        /// Peer address
        peer: Option<SocketAddr>,
        /// Event timestamp
        timestamp: DateTime<Utc>,
    },
    /// First byte was not the unlock signal
    UnlockRejected {
        /// Session identifier
        session_id: Uuid,
        /// Peer address
        peer: Option<SocketAddr>,
        /// Byte received, if any arrived
        received: Option<u8>,
        /// Event timestamp
        timestamp: DateTime<Utc>,
    },
    /// Username hint accepted
    Authenticated {
        /// Session identifier
        session_id: Uuid,
        /// Username hint (lossy UTF-8)
        username: String,
        /// Event timestamp
        timestamp: DateTime<Utc>,
    },
    /// Download, upload or list
    FileOperation {
        /// Session identifier
        session_id: Uuid,
        /// Username hint (lossy UTF-8)
        username: String,
        /// Operation performed
        operation: String,
        /// Resolved path
        path: String,
        /// Whether the operation succeeded
        success: bool,
        /// Bytes (or entries, for listings) transferred
        bytes_transferred: Option<u64>,
        /// Error message if failed
        error: Option<String>,
        /// Event timestamp
        timestamp: DateTime<Utc>,
    },
    /// Connection closed
    ConnectionClosed {
        /// Session identifier
        session_id: Uuid,
        /// Peer address
        peer: Option<SocketAddr>,
        /// Username hint (lossy UTF-8), empty before authentication
        username: String,
        /// How the session ended
        outcome: String,
        /// Session duration in milliseconds
        duration_ms: i64,
        /// Event timestamp
        timestamp: DateTime<Utc>,
    },
}

impl AuditEvent {
    /// Log the audit event
    pub fn log(&self) {
        match self {
            AuditEvent::ConnectionEstablished {
                session_id, peer, ..
            } => {
                info!(
                    event = "connection_established",
                    %session_id,
                    peer = ?peer,
                    "New connection established"
                );
            }
            AuditEvent::UnlockRejected {
                session_id,
                peer,
                received,
                ..
            } => {
                warn!(
                    event = "unlock_rejected",
                    %session_id,
                    peer = ?peer,
                    received = ?received,
                    "Bad or missing unlock signal"
                );
            }
            AuditEvent::Authenticated {
                session_id,
                username,
                ..
            } => {
                info!(
                    event = "authenticated",
                    %session_id,
                    username,
                    "Username hint received"
                );
            }
            AuditEvent::FileOperation {
                session_id,
                username,
                operation,
                path,
                success,
                bytes_transferred,
                error,
                ..
            } => {
                if *success {
                    info!(
                        event = "file_operation",
                        %session_id,
                        username,
                        operation,
                        path,
                        bytes = ?bytes_transferred,
                        "File operation completed"
                    );
                } else {
                    warn!(
                        event = "file_operation_failed",
                        %session_id,
                        username,
                        operation,
                        path,
                        error = ?error,
                        "File operation failed"
                    );
                }
            }
            AuditEvent::ConnectionClosed {
                session_id,
                username,
                outcome,
                duration_ms,
                ..
            } => {
                info!(
                    event = "connection_closed",
                    %session_id,
                    username,
                    outcome,
                    duration_ms,
                    "Connection closed"
                );
            }
        }
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Per-session audit context
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Unique session identifier
    pub session_id: Uuid,
    /// Peer address, when the transport has one
    pub peer: Option<SocketAddr>,
    /// Username hint (lossy UTF-8)
    pub username: String,
    /// Session start time
    pub start_time: DateTime<Utc>,
    enabled: bool,
}

impl SessionInfo {
    /// Create a new session context
    pub fn new(peer: Option<SocketAddr>, enabled: bool) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            peer,
            username: String::new(),
            start_time: Utc::now(),
            enabled,
        }
    }

    /// Session duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.start_time)
            .num_milliseconds()
    }

    fn emit(&self, event: &AuditEvent) {
        if self.enabled {
            event.log();
        }
    }

    /// Record the accepted connection
    pub fn connection_established(&self) {
        self.emit(&AuditEvent::ConnectionEstablished {
            session_id: self.session_id,
            peer: self.peer,
            timestamp: Utc::now(),
        });
    }

    /// Record a failed unlock handshake
    pub fn unlock_rejected(&self, received: Option<u8>) {
        self.emit(&AuditEvent::UnlockRejected {
            session_id: self.session_id,
            peer: self.peer,
            received,
            timestamp: Utc::now(),
        });
    }

    /// Record the username hint
    pub fn authenticated(&mut self, username: String) {
        self.username = username;
        self.emit(&AuditEvent::Authenticated {
            session_id: self.session_id,
            username: self.username.clone(),
            timestamp: Utc::now(),
        });
    }

    /// Record the result of an operation
    pub fn file_operation(
        &self,
        mode: Mode,
        path: &Path,
        bytes: Option<u64>,
        error: Option<String>,
    ) {
        self.emit(&AuditEvent::FileOperation {
            session_id: self.session_id,
            username: self.username.clone(),
            operation: mode.to_string(),
            path: path.display().to_string(),
            success: error.is_none(),
            bytes_transferred: bytes,
            error,
            timestamp: Utc::now(),
        });
    }

    /// Record the end of the session
    pub fn connection_closed(&self, outcome: &str) {
        self.emit(&AuditEvent::ConnectionClosed {
            session_id: self.session_id,
            peer: self.peer,
            username: self.username.clone(),
            outcome: outcome.to_string(),
            duration_ms: self.duration_ms(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_json_is_tagged() {
        let event = AuditEvent::UnlockRejected {
            session_id: Uuid::new_v4(),
            peer: Some("127.0.0.1:40000".parse().unwrap()),
            received: Some(0x02),
            timestamp: Utc::now(),
        };

        let json = event.to_json().expect("JSON serialization failed");
        assert!(json.contains("\"event_type\":\"UnlockRejected\""));
        assert!(json.contains("127.0.0.1:40000"));
    }

    #[test]
    fn test_session_info() {
        let mut session = SessionInfo::new(None, false);
        assert!(session.username.is_empty());

        session.authenticated("alice".to_string());
        assert_eq!(session.username, "alice");
        assert!(session.duration_ms() >= 0);
    }

    #[test]
    fn test_file_operation_audit() {
        let mut session = SessionInfo::new(Some("10.0.0.2:5555".parse().unwrap()), true);
        session.authenticated("bob".to_string());
        session.file_operation(Mode::Upload, Path::new("/srv/bob/in.bin"), Some(42), None);
        session.file_operation(
            Mode::Download,
            Path::new("/srv/bob/missing"),
            None,
            Some("not found".into()),
        );
        session.connection_closed("completed");
        // Test passes if no panic
    }
}
