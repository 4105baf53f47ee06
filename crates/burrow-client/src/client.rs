//! Burrow client
//!
//! Every operation opens a fresh connection and follows the same opening:
//! unlock byte, username frame, mode byte, path frame, status byte. The
//! `*_over` functions run an exchange over any stream, which is how the
//! [`Client`] methods are built and how tests drive them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use burrow_core::protocol::{CHUNK_SIZE, UNLOCK_SIGNAL, codec};
use burrow_core::{Error, Mode, Result, Status, rawpath};
use bytes::{BufMut, BytesMut};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// How long [`Client`] waits for a connection unless told otherwise
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for a burrow server
#[derive(Debug, Clone)]
pub struct Client {
    host: String,
    port: u16,
    username: String,
    connect_timeout: Duration,
}

impl Client {
    /// Create a client; nothing is connected until an operation runs
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Give up on connecting after `timeout`
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn connect(&self) -> Result<TcpStream> {
        debug!(host = %self.host, port = self.port, "Connecting");
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(stream) => stream.map_err(|e| Error::connection("connect", &e)),
            Err(_) => Err(Error::Connection(format!(
                "connect to {}:{} timed out after {:?}",
                self.host, self.port, self.connect_timeout
            ))),
        }
    }

    /// Download `remote` into `output_dir`, returning the saved path
    pub async fn download(&self, remote: &str, output_dir: &Path) -> Result<PathBuf> {
        let mut stream = self.connect().await?;
        let saved = download_over(
            &mut stream,
            self.username.as_bytes(),
            remote.as_bytes(),
            output_dir,
        )
        .await?;
        info!(remote, path = ?saved, "Download complete");
        Ok(saved)
    }

    /// Upload `local` to `remote`, or to the local basename when `remote` is `None`
    ///
    /// Returns once the server has closed the connection, at which point the
    /// file is fully written on the server side.
    pub async fn upload(&self, local: &Path, remote: Option<&str>) -> Result<u64> {
        let mut file = fs::File::open(local).await?;
        let target = match remote {
            Some(remote) => remote.as_bytes().to_vec(),
            None => local
                .file_name()
                .map(|name| rawpath::os_bytes(name).into_owned())
                .ok_or_else(|| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("{} has no file name", local.display()),
                    ))
                })?,
        };

        let mut stream = self.connect().await?;
        let sent = upload_over(&mut stream, self.username.as_bytes(), &target, &mut file).await?;
        info!(
            local = ?local,
            remote = %String::from_utf8_lossy(&target),
            bytes = sent,
            "Upload complete"
        );
        Ok(sent)
    }

    /// Names of the entries of directory `remote`
    pub async fn list(&self, remote: &str) -> Result<Vec<Vec<u8>>> {
        let mut stream = self.connect().await?;
        list_over(&mut stream, self.username.as_bytes(), remote.as_bytes()).await
    }
}

/// Send the common request prefix and wait for the status byte
async fn request<S>(stream: &mut S, username: &[u8], mode: Mode, path: &[u8]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(2 + 8 + username.len() + path.len());
    buf.put_u8(UNLOCK_SIGNAL);
    codec::put_frame(&mut buf, username)?;
    buf.put_u8(mode.as_byte());
    codec::put_frame(&mut buf, path)?;

    stream
        .write_all(&buf)
        .await
        .map_err(|e| Error::connection("send request", &e))?;
    stream
        .flush()
        .await
        .map_err(|e| Error::connection("send request", &e))?;

    match codec::read_status(stream).await? {
        Status::Ok => Ok(()),
        Status::Error => Err(Error::Refused(mode)),
    }
}

/// A server-sent file name is only used if it names a single entry
fn checked_name(name: &[u8]) -> Result<&[u8]> {
    if matches!(name, b"" | b"." | b"..") || name.contains(&b'/') {
        return Err(Error::Protocol(format!(
            "Unsafe file name from server: {:?}",
            String::from_utf8_lossy(name)
        )));
    }
    Ok(name)
}

/// Run a download exchange over `stream`
pub async fn download_over<S>(
    stream: &mut S,
    username: &[u8],
    remote: &[u8],
    output_dir: &Path,
) -> Result<PathBuf>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    request(stream, username, Mode::Download, remote).await?;

    let name = codec::read_frame(stream).await?;
    let target = output_dir.join(rawpath::to_path(checked_name(&name)?));

    fs::create_dir_all(output_dir)
        .await
        .map_err(|e| Error::resource(output_dir, e))?;
    let mut file = fs::File::create(&target)
        .await
        .map_err(|e| Error::resource(&target, e))?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut received = 0u64;
    loop {
        let n = stream
            .read(&mut buffer)
            .await
            .map_err(|e| Error::connection("receive file data", &e))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .await
            .map_err(|e| Error::resource(&target, e))?;
        received += n as u64;
    }
    file.flush().await.map_err(|e| Error::resource(&target, e))?;

    debug!(path = ?target, bytes = received, "File received");
    Ok(target)
}

/// Run an upload exchange over `stream`, sending everything `source` yields
pub async fn upload_over<S, R>(
    stream: &mut S,
    username: &[u8],
    remote: &[u8],
    source: &mut R,
) -> Result<u64>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    request(stream, username, Mode::Upload, remote).await?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut sent = 0u64;
    loop {
        let n = source.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        stream
            .write_all(&buffer[..n])
            .await
            .map_err(|e| Error::connection("send file data", &e))?;
        sent += n as u64;
    }

    // End of stream is the only end-of-file marker the server understands.
    stream
        .shutdown()
        .await
        .map_err(|e| Error::connection("finish upload", &e))?;

    let mut trailing = Vec::new();
    stream
        .read_to_end(&mut trailing)
        .await
        .map_err(|e| Error::connection("wait for server close", &e))?;
    if !trailing.is_empty() {
        debug!(bytes = trailing.len(), "Ignoring unexpected bytes after upload");
    }

    Ok(sent)
}

/// Run a list exchange over `stream`
pub async fn list_over<S>(stream: &mut S, username: &[u8], remote: &[u8]) -> Result<Vec<Vec<u8>>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    request(stream, username, Mode::List, remote).await?;

    let mut names = Vec::new();
    while let Some(name) = codec::read_frame_or_end(stream).await? {
        names.push(name.to_vec());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_checked_name() {
        assert!(checked_name(b"report.pdf").is_ok());
        assert!(checked_name(b".hidden").is_ok());
        for bad in [&b""[..], b".", b"..", b"../etc/passwd", b"a/b", b"/abs"] {
            assert!(matches!(checked_name(bad), Err(Error::Protocol(_))));
        }
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_timeout() {
        // TEST-NET-1 is never routed; the attempt either hangs or fails fast.
        let client = Client::new("192.0.2.1", 9001, "alice")
            .with_connect_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let result = client.list("~").await;

        assert!(matches!(result, Err(Error::Connection(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_default_connect_timeout() {
        let client = Client::new("localhost", 9001, "alice");
        assert_eq!(client.connect_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_request_bytes_and_refusal() {
        let (mut client, mut server) = duplex(1024);

        let peer = tokio::spawn(async move {
            let mut head = vec![0u8; 1 + 4 + 5 + 1 + 4 + 3];
            server.read_exact(&mut head).await.unwrap();
            server.write_all(&[0x01]).await.unwrap();
            head
        });

        let result = list_over(&mut client, b"alice", b"~/x").await;
        assert!(matches!(result, Err(Error::Refused(Mode::List))));

        let head = peer.await.unwrap();
        let mut expected = vec![0x01, 0, 0, 0, 5];
        expected.extend(b"alice");
        expected.push(b'L');
        expected.extend([0, 0, 0, 3]);
        expected.extend(b"~/x");
        assert_eq!(head, expected);
    }

    #[tokio::test]
    async fn test_download_rejects_traversal_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let (mut client, mut server) = duplex(1024);

        tokio::spawn(async move {
            let mut head = vec![0u8; 1 + 4 + 1 + 1 + 4 + 1];
            server.read_exact(&mut head).await.unwrap();
            let mut reply = vec![0x00, 0, 0, 0, 2];
            reply.extend(b"..");
            server.write_all(&reply).await.unwrap();
        });

        let result = download_over(&mut client, b"u", b"f", dir.path()).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
