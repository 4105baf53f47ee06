//! Upload (`U`): receive a file from the client
//!
//! Upload payloads carry no length. After OK the client streams raw bytes and
//! closes its write side; end-of-stream is the only terminator. An existing
//! file at the target is overwritten.

use std::path::PathBuf;

use async_trait::async_trait;
use burrow_core::protocol::CHUNK_SIZE;
use burrow_core::{Error, Mode, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error};

use super::Handler;
use crate::fs::FileWriter;
use crate::path::ensure_parent_directories;
use crate::session::Services;

/// An opened upload target
pub struct Upload {
    path: PathBuf,
    file: FileWriter,
}

#[async_trait]
impl Handler for Upload {
    const MODE: Mode = Mode::Upload;

    async fn open(target: PathBuf, services: &Services) -> Result<Self> {
        ensure_parent_directories(services.fs(), &target).await?;

        let file = services
            .fs()
            .open_write(&target)
            .await
            .map_err(|e| Error::resource(target.clone(), e))?;

        Ok(Self { path: target, file })
    }

    async fn transfer<S>(mut self, stream: &mut S) -> Result<u64>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        debug!(path = ?self.path, "Receiving file");

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut received = 0u64;
        loop {
            let n = match stream.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    error!(path = ?self.path, error = %e, "Receiving file data failed");
                    return Err(Error::connection("receive file data", &e));
                }
            };
            self.file
                .write_all(&buffer[..n])
                .await
                .map_err(|e| Error::resource(self.path.clone(), e))?;
            received += n as u64;
        }

        self.file
            .flush()
            .await
            .map_err(|e| Error::resource(self.path.clone(), e))?;

        Ok(received)
    }
}
