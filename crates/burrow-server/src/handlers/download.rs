//! Download (`D`): send a file to the client
//!
//! After OK the server sends the basename of the resolved path as a frame,
//! then the raw file bytes until EOF. The end of the connection is the only
//! end-of-file marker.

use std::path::PathBuf;

use async_trait::async_trait;
use burrow_core::protocol::{CHUNK_SIZE, codec};
use burrow_core::{Error, Mode, Result, rawpath};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::Handler;
use crate::fs::FileReader;
use crate::path::basename;
use crate::session::Services;

/// An opened download
pub struct Download {
    path: PathBuf,
    name: Vec<u8>,
    file: FileReader,
}

#[async_trait]
impl Handler for Download {
    const MODE: Mode = Mode::Download;

    async fn open(target: PathBuf, services: &Services) -> Result<Self> {
        // Owned copy: the name must not borrow from the path handed to open.
        let name = basename(&rawpath::path_bytes(&target)).to_vec();

        let file = services
            .fs()
            .open_read(&target)
            .await
            .map_err(|e| Error::resource(target.clone(), e))?;

        Ok(Self {
            path: target,
            name,
            file,
        })
    }

    async fn transfer<S>(mut self, stream: &mut S) -> Result<u64>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        codec::write_frame(stream, &self.name).await?;
        debug!(path = ?self.path, "Sending file");

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut sent = 0u64;
        loop {
            let n = self
                .file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::resource(self.path.clone(), e))?;
            if n == 0 {
                break;
            }
            stream
                .write_all(&buffer[..n])
                .await
                .map_err(|e| Error::connection("send file data", &e))?;
            sent += n as u64;
        }

        Ok(sent)
    }
}
