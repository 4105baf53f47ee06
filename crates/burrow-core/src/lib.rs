//! # Burrow Core
//!
//! Shared building blocks for the burrow remote file-access service:
//!
//! - the error taxonomy used on both ends of a session
//! - the wire protocol constants, mode and status bytes
//! - the framing codec (length-prefixed byte strings)
//! - conversions between raw wire bytes and filesystem paths

pub mod error;
pub mod protocol;
pub mod rawpath;

pub use error::{Error, Result};
pub use protocol::{Mode, Status};
