//! # Burrow client
//!
//! Library side of the `burrow-client` tool: one connection per operation,
//! speaking the burrow wire protocol to download, upload or list.

pub mod client;

pub use burrow_core::{Error, Result};
pub use client::{CONNECT_TIMEOUT, Client, download_over, list_over, upload_over};
