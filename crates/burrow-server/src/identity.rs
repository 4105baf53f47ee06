//! Identity and environment collaborators
//!
//! The session never authenticates anyone. The client-supplied username is a
//! hint used only to expand `~`, so all this module needs is a way to map a
//! username to a home directory and a way to read `HOME` as a fallback.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use tracing::debug;

/// Maps a username to its home directory
///
/// Implementations may block. Sessions call them through
/// [`PathResolver::resolve_blocking_safe`](crate::path::PathResolver::resolve_blocking_safe),
/// which runs tilde lookups on the blocking pool.
pub trait IdentityResolver: Send + Sync {
    /// Home directory of `username`, or `None` if the user is unknown
    fn home_dir(&self, username: &str) -> Option<PathBuf>;
}

/// Reads process environment variables
pub trait Environment: Send + Sync {
    /// Value of `key`, or `None` if unset
    fn var(&self, key: &str) -> Option<OsString>;
}

/// Resolves users through the system password database
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

#[cfg(unix)]
impl IdentityResolver for SystemIdentity {
    fn home_dir(&self, username: &str) -> Option<PathBuf> {
        match nix::unistd::User::from_name(username) {
            Ok(Some(user)) => Some(user.dir),
            Ok(None) => {
                debug!(username, "User not found in password database");
                None
            }
            Err(e) => {
                debug!(username, error = %e, "Password database lookup failed");
                None
            }
        }
    }
}

/// Non-Unix platforms have no password database to consult
#[cfg(not(unix))]
impl IdentityResolver for SystemIdentity {
    fn home_dir(&self, username: &str) -> Option<PathBuf> {
        debug!(username, "No password database on this platform");
        None
    }
}

/// Reads the environment of the server process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }
}

/// Fixed username → home directory table
///
/// Useful when the accounts served are not system accounts.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    homes: HashMap<String, PathBuf>,
}

impl StaticIdentity {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user
    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        self.homes.insert(username.into(), home.into());
        self
    }
}

impl IdentityResolver for StaticIdentity {
    fn home_dir(&self, username: &str) -> Option<PathBuf> {
        self.homes.get(username).cloned()
    }
}

/// Fixed set of environment variables
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    vars: HashMap<String, OsString>,
}

impl StaticEnvironment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn var(&self, key: &str) -> Option<OsString> {
        self.vars.get(key).cloned()
    }
}
