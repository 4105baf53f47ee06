//! List (`L`): enumerate a directory
//!
//! Entries are sent in the order the filesystem returns them; no sorting is
//! applied. `.` and `..` are never sent. A zero-length frame ends the list.

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use burrow_core::protocol::codec;
use burrow_core::{Error, Mode, Result, rawpath};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::Handler;
use crate::session::Services;

/// An enumerated directory
pub struct List {
    path: PathBuf,
    entries: Vec<OsString>,
}

#[async_trait]
impl Handler for List {
    const MODE: Mode = Mode::List;

    async fn open(target: PathBuf, services: &Services) -> Result<Self> {
        let entries = services
            .fs()
            .list_dir(&target)
            .await
            .map_err(|e| Error::resource(target.clone(), e))?;

        Ok(Self {
            path: target,
            entries,
        })
    }

    async fn transfer<S>(self, stream: &mut S) -> Result<u64>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut sent = 0u64;
        for entry in &self.entries {
            let name = rawpath::os_bytes(entry);
            if matches!(&*name, b"" | b"." | b"..") {
                continue;
            }
            if let Err(e) = codec::write_frame(stream, &name).await {
                if matches!(e, Error::Protocol(_)) {
                    // Cannot be framed; the peer would reject it.
                    warn!(path = ?self.path, entry = ?entry, "Skipping oversized entry name");
                    continue;
                }
                return Err(e);
            }
            sent += 1;
        }
        codec::write_end_of_list(stream).await?;

        debug!(path = ?self.path, entries = sent, "Directory listed");
        Ok(sent)
    }
}
