//! Operation handlers
//!
//! Each mode is split in two phases. [`Handler::open`] does everything that
//! may fail with a wire-visible resource error; its result decides the status
//! byte. [`Handler::transfer`] runs only after OK has been sent, so any
//! failure there simply ends the connection.

use std::path::PathBuf;

use async_trait::async_trait;
use burrow_core::protocol::codec;
use burrow_core::{Error, Mode, Result, Status, rawpath};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::path::UsernameHint;
use crate::session::Services;

pub mod download;
pub mod list;
pub mod upload;

pub use download::Download;
pub use list::List;
pub use upload::Upload;

/// One mode's data-phase protocol
#[async_trait]
pub trait Handler: Sized + Send {
    /// Mode byte this handler serves
    const MODE: Mode;

    /// Open the resource behind an already resolved path
    async fn open(target: PathBuf, services: &Services) -> Result<Self>;

    /// Run the data phase; returns the number of payload bytes moved
    async fn transfer<S>(self, stream: &mut S) -> Result<u64>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send;
}

/// What a handler did on the wire
#[derive(Debug)]
pub enum Served {
    /// OK was sent and the data phase finished
    Completed {
        /// Resolved path the operation acted on
        path: PathBuf,
        /// Payload bytes moved (file bytes, or entry count for listings)
        bytes: u64,
    },
    /// ERROR was sent
    Refused {
        /// Resolved path the operation acted on
        path: PathBuf,
        /// Cause, logged locally only
        error: Error,
    },
}

/// Read the request path, open the resource, send the status, transfer
///
/// Errors returned from here are silent disconnects: either the wire
/// contract broke before a status could be sent, or the data phase failed
/// after OK.
pub async fn serve<H, S>(
    stream: &mut S,
    hint: &UsernameHint,
    services: &Services,
) -> Result<Served>
where
    H: Handler,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let raw = codec::read_frame(stream).await?;
    let target = match services.resolver().resolve_blocking_safe(&raw, hint).await {
        Ok(target) => target,
        Err(error) => return refuse::<H, S>(stream, rawpath::to_path(&raw), error).await,
    };
    debug!(mode = %H::MODE, path = ?target, "Resolved request path");

    let handler = match H::open(target.clone(), services).await {
        Ok(handler) => handler,
        Err(error) if error.is_wire_visible() => {
            return refuse::<H, S>(stream, target, error).await;
        }
        Err(error) => return Err(error),
    };

    codec::write_status(stream, Status::Ok).await?;
    let bytes = handler.transfer(stream).await?;
    Ok(Served::Completed {
        path: target,
        bytes,
    })
}

/// Send the ERROR status for a request that could not be opened
async fn refuse<H, S>(stream: &mut S, path: PathBuf, error: Error) -> Result<Served>
where
    H: Handler,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    warn!(mode = %H::MODE, path = ?path, error = %error, "Refusing request");
    codec::write_status(stream, Status::Error).await?;
    Ok(Served::Refused { path, error })
}
