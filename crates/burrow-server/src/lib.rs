//! # Burrow server
//!
//! Minimal file-transfer service over raw TCP. A client unlocks the session
//! with a single byte, names a user for `~` expansion, picks one of three
//! modes and then either downloads a file, uploads a file or lists a
//! directory. One operation per connection.
//!
//! ## Wire format
//!
//! ```text
//! client -> 0x01                         unlock
//! client -> len:u32be username           hint, 1..=4096 bytes
//! client -> 'D' | 'U' | 'L'              mode
//! client -> len:u32be path               target
//! server -> 0x00 | 0x01                  OK | ERROR
//! ```
//!
//! After OK, a download sends the file's basename as a frame and then the
//! raw contents until close; an upload reads raw bytes until the client
//! half-closes; a listing sends one frame per entry followed by a zero
//! length terminator.

pub mod audit;
pub mod config;
pub mod fs;
pub mod handlers;
pub mod identity;
pub mod logging;
pub mod path;
pub mod server;
pub mod session;

pub use config::{Config, LogFormat, LoggingConfig};
pub use fs::{Filesystem, LocalFilesystem};
pub use identity::{Environment, IdentityResolver, StaticEnvironment, StaticIdentity};
pub use path::{PathResolver, UsernameHint};
pub use server::Server;
pub use session::{Services, SessionOutcome, SessionState, run_session};
