//! Burrow wire protocol
//!
//! A session is a single exchange over one TCP connection:
//!
//! ```text
//! handshake:   unlock_byte(1) = 0x01
//! auth:        name_len(4) name_bytes(name_len)
//! mode:        mode_byte(1) in {'D','U','L'}
//!
//! download:    path_len(4) path_bytes
//!   -> status(1); if OK: fname_len(4) fname_bytes file_bytes...(until EOF)
//! upload:      path_len(4) path_bytes
//!   -> status(1); if OK: [client streams raw file_bytes until it closes its side]
//! list:        path_len(4) path_bytes
//!   -> status(1); if OK: repeated{ name_len(4) name_bytes }... terminated by name_len(4)=0
//! ```
//!
//! All multi-byte integers are big-endian. Strings are raw bytes with no
//! encoding validation.

use std::fmt;

/// Pre-authentication gate value, the first byte a client sends
pub const UNLOCK_SIGNAL: u8 = 0x01;

/// Largest payload a frame may carry
pub const MAX_FRAME_LEN: usize = 4096;

/// Size of the chunks file contents are streamed in
pub const CHUNK_SIZE: usize = 4096;

/// Port the server listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 9001;

/// Operation selected by the mode byte
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Send a file to the client
    Download = b'D',
    /// Receive a file from the client
    Upload = b'U',
    /// Enumerate a directory
    List = b'L',
}

impl Mode {
    /// Wire representation of this mode
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Mode {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, crate::Error> {
        match value {
            b'D' => Ok(Mode::Download),
            b'U' => Ok(Mode::Upload),
            b'L' => Ok(Mode::List),
            _ => Err(crate::Error::Protocol(format!(
                "Unknown mode byte: 0x{value:02x}"
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Download => "download",
            Mode::Upload => "upload",
            Mode::List => "list",
        })
    }
}

/// Status byte sent before the data phase of every operation
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Resource opened, data phase follows
    Ok = 0x00,
    /// Resource could not be opened; the connection closes next
    Error = 0x01,
}

impl Status {
    /// Wire representation of this status
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Status {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, crate::Error> {
        match value {
            0x00 => Ok(Status::Ok),
            0x01 => Ok(Status::Error),
            _ => Err(crate::Error::Protocol(format!(
                "Unknown status byte: 0x{value:02x}"
            ))),
        }
    }
}

/// Framing primitives: length-prefixed byte strings and single bytes
///
/// `read_exact`/`write_all` absorb partial socket transfers, so only EOF or a
/// socket fault surfaces as an error.
pub mod codec {
    use bytes::{BufMut, Bytes, BytesMut};
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    use super::{MAX_FRAME_LEN, Status};
    use crate::{Error, Result};

    /// Append a length-prefixed frame to `buf`
    pub fn put_frame(buf: &mut BytesMut, data: &[u8]) -> Result<()> {
        if data.len() > MAX_FRAME_LEN {
            return Err(Error::Protocol(format!(
                "Frame of {} bytes exceeds maximum of {MAX_FRAME_LEN}",
                data.len()
            )));
        }
        let len = u32::try_from(data.len())
            .map_err(|_| Error::Protocol("Frame length overflows u32".into()))?;
        buf.reserve(4 + data.len());
        buf.put_u32(len);
        buf.put_slice(data);
        Ok(())
    }

    /// Read one byte
    pub async fn read_byte<R>(reader: &mut R) -> Result<u8>
    where
        R: AsyncRead + Unpin,
    {
        reader
            .read_u8()
            .await
            .map_err(|e| Error::connection("read byte", &e))
    }

    /// Write one byte
    pub async fn write_byte<W>(writer: &mut W, byte: u8) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer
            .write_all(&[byte])
            .await
            .map_err(|e| Error::connection("write byte", &e))
    }

    /// Write a status byte
    pub async fn write_status<W>(writer: &mut W, status: Status) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        write_byte(writer, status.as_byte()).await
    }

    /// Read a status byte
    pub async fn read_status<R>(reader: &mut R) -> Result<Status>
    where
        R: AsyncRead + Unpin,
    {
        Status::try_from(read_byte(reader).await?)
    }

    /// Read a frame whose length must be in `1..=MAX_FRAME_LEN`
    pub async fn read_frame<R>(reader: &mut R) -> Result<Bytes>
    where
        R: AsyncRead + Unpin,
    {
        read_frame_or_end(reader)
            .await?
            .ok_or_else(|| Error::Protocol("Zero-length frame".into()))
    }

    /// Read a frame, returning `None` for the zero-length end-of-list sentinel
    pub async fn read_frame_or_end<R>(reader: &mut R) -> Result<Option<Bytes>>
    where
        R: AsyncRead + Unpin,
    {
        let len = reader
            .read_u32()
            .await
            .map_err(|e| Error::connection("read frame length", &e))?;
        if len == 0 {
            return Ok(None);
        }

        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= MAX_FRAME_LEN)
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "Frame length {len} exceeds maximum of {MAX_FRAME_LEN}"
                ))
            })?;

        let mut buf = BytesMut::zeroed(len);
        reader
            .read_exact(&mut buf)
            .await
            .map_err(|e| Error::connection("read frame payload", &e))?;
        Ok(Some(buf.freeze()))
    }

    /// Write a length-prefixed frame
    pub async fn write_frame<W>(writer: &mut W, data: &[u8]) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::new();
        put_frame(&mut buf, data)?;
        writer
            .write_all(&buf)
            .await
            .map_err(|e| Error::connection("write frame", &e))
    }

    /// Write the zero-length frame that terminates a listing
    pub async fn write_end_of_list<W>(writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer
            .write_all(&0u32.to_be_bytes())
            .await
            .map_err(|e| Error::connection("write end of list", &e))
    }
}

#[cfg(test)]
mod tests {
    use super::codec::*;
    use super::*;
    use crate::Error;
    use tokio::io::{AsyncWriteExt, duplex};

    #[test]
    fn test_mode_conversions() {
        assert_eq!(Mode::try_from(b'D').unwrap(), Mode::Download);
        assert_eq!(Mode::try_from(b'U').unwrap(), Mode::Upload);
        assert_eq!(Mode::try_from(b'L').unwrap(), Mode::List);
        assert_eq!(Mode::List.as_byte(), b'L');
        assert!(Mode::try_from(b'd').is_err());
        assert!(matches!(Mode::try_from(0x00), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_status_conversions() {
        assert_eq!(Status::try_from(0x00).unwrap(), Status::Ok);
        assert_eq!(Status::try_from(0x01).unwrap(), Status::Error);
        assert!(matches!(Status::try_from(0x02), Err(Error::Protocol(_))));
        assert!(matches!(Status::try_from(0xff), Err(Error::Protocol(_))));
        assert_eq!(Status::Error.as_byte(), 0x01);
    }

    #[test]
    fn test_put_frame_layout() {
        let mut buf = bytes::BytesMut::new();
        put_frame(&mut buf, b"abc").unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_put_frame_rejects_oversize() {
        let mut buf = bytes::BytesMut::new();
        let data = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(put_frame(&mut buf, &data), Err(Error::Protocol(_))));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_frame_round_trip_with_partial_transfers() {
        // A one-byte pipe forces every read and write to be split.
        let (mut client, mut server) = duplex(1);
        let payload: Vec<u8> = (0..MAX_FRAME_LEN).map(|i| (i % 251) as u8).collect();

        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            write_frame(&mut client, &payload).await.unwrap();
            write_frame(&mut client, b"x").await.unwrap();
        });

        let first = read_frame(&mut server).await.unwrap();
        let second = read_frame(&mut server).await.unwrap();
        writer.await.unwrap();

        assert_eq!(&first[..], &expected[..]);
        assert_eq!(&second[..], b"x");
    }

    #[tokio::test]
    async fn test_read_frame_rejects_zero_length() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0, 0, 0, 0]).await.unwrap();
        assert!(matches!(
            read_frame(&mut server).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_read_frame_or_end_accepts_sentinel() {
        let (mut client, mut server) = duplex(64);
        write_frame(&mut client, b"a.txt").await.unwrap();
        write_end_of_list(&mut client).await.unwrap();

        let entry = read_frame_or_end(&mut server).await.unwrap();
        assert_eq!(entry.as_deref(), Some(&b"a.txt"[..]));
        assert!(read_frame_or_end(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversize_length() {
        let (mut client, mut server) = duplex(64);
        let len = u32::try_from(MAX_FRAME_LEN + 1).unwrap();
        client.write_all(&len.to_be_bytes()).await.unwrap();
        assert!(matches!(
            read_frame(&mut server).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_short_payload_is_connection_error() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0, 0, 0, 10, b's', b'h']).await.unwrap();
        drop(client);
        assert!(matches!(
            read_frame(&mut server).await,
            Err(Error::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_read_byte_at_eof_is_connection_error() {
        let (client, mut server) = duplex(64);
        drop(client);
        assert!(matches!(
            read_byte(&mut server).await,
            Err(Error::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_status_round_trip() {
        let (mut client, mut server) = duplex(64);
        write_status(&mut server, Status::Error).await.unwrap();
        assert_eq!(read_status(&mut client).await.unwrap(), Status::Error);
    }
}
