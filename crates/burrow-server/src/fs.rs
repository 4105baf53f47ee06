//! Filesystem collaborator
//!
//! Handlers treat every filesystem call as a fallible black box. The trait
//! keeps the session engine independent of `tokio::fs` so tests can
//! substitute their own.

use std::ffi::OsString;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Readable file handle
pub type FileReader = Box<dyn AsyncRead + Send + Unpin>;

/// Writable file handle
pub type FileWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Permissions for directories created on behalf of an upload
pub const DIR_MODE: u32 = 0o755;

/// Filesystem operations used by the operation handlers
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Open an existing file for reading
    async fn open_read(&self, path: &Path) -> io::Result<FileReader>;

    /// Open a file for writing, creating it or truncating existing contents
    async fn open_write(&self, path: &Path) -> io::Result<FileWriter>;

    /// Create a single directory
    ///
    /// Must report `ErrorKind::AlreadyExists` when the path already exists.
    async fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Names of the entries in a directory, in enumeration order
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<OsString>>;
}

/// The local filesystem of the server process
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn open_read(&self, path: &Path) -> io::Result<FileReader> {
        let file = fs::File::open(path).await?;
        // Opening a directory succeeds on Unix; reading from it does not.
        if file.metadata().await?.is_dir() {
            return Err(io::Error::other("is a directory"));
        }
        Ok(Box::new(file))
    }

    async fn open_write(&self, path: &Path) -> io::Result<FileWriter> {
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;
        Ok(Box::new(file))
    }

    async fn create_dir(&self, path: &Path) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder.create(path).await
    }

    async fn list_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let mut read_dir = fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            names.push(entry.file_name());
        }
        debug!(path = ?path, entries = names.len(), "Enumerated directory");
        Ok(names)
    }
}
