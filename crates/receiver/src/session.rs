//! Per-connection receive loop.
//!
//! A session walks the same cycle for every frame:
//!
//! ```text
//! AwaitingFrame -> ReadingFileName -> ReadingFileSize -> ReceivingPayload
//!       ^                                                      |
//!       +------------------------------------------------------+
//! ```
//!
//! and closes on the end marker or on the first error. A stream that ends
//! without the marker is an error, even at a frame boundary. Frames are handled strictly in order and
//! at most one destination file is open at any time.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::DEFAULT_BUFFER_SIZE;
use crate::error::SessionError;
use crate::reader::read_full;
use crate::storage::Storage;
use crate::wire::{FIELD_LEN, FrameHeader, read_frame_header};

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Scratch buffer capacity. Bounds both file name length and payload
    /// chunk size. Values below 4 are raised to 4.
    pub buffer_size: usize,
    /// Limit on each protocol step (one header, or one payload chunk).
    /// `None` waits forever on a stalled peer.
    pub read_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            read_timeout: None,
        }
    }
}

/// A file stored by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Summary of a session that reached its end marker.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Files in the order they were received.
    pub files: Vec<ReceivedFile>,
    /// Payload bytes across all files.
    pub total_bytes: u64,
}

/// Receives framed uploads from one stream into a [`Storage`].
pub struct TransferSession<R, S> {
    reader: R,
    storage: Arc<S>,
    scratch: Vec<u8>,
    read_timeout: Option<Duration>,
}

impl<R, S> TransferSession<R, S>
where
    R: AsyncRead + Unpin,
    S: Storage,
{
    pub fn new(reader: R, storage: Arc<S>, config: &SessionConfig) -> Self {
        Self {
            reader,
            storage,
            scratch: vec![0u8; config.buffer_size.max(FIELD_LEN)],
            read_timeout: config.read_timeout,
        }
    }

    /// Runs the receive loop to completion.
    ///
    /// Consumes the session, so the stream is released on every exit path.
    /// On a mid-payload failure the destination keeps whatever prefix had
    /// arrived.
    pub async fn run(mut self) -> Result<SessionReport, SessionError> {
        let mut files = Vec::new();
        let mut total_bytes = 0u64;

        while let Some(header) = within(
            self.read_timeout,
            read_frame_header(&mut self.reader, &mut self.scratch),
        )
        .await?
        {
            debug!(
                name = %header.file_name,
                size = header.file_size,
                "receiving file"
            );

            let path = self.receive_file(&header).await?;

            debug!(path = %path.display(), size = header.file_size, "file received");
            total_bytes += header.file_size;
            files.push(ReceivedFile {
                name: header.file_name,
                path,
                size: header.file_size,
            });
        }

        debug!(files = files.len(), total_bytes, "end marker received");
        Ok(SessionReport { files, total_bytes })
    }

    /// Creates the destination and relays exactly `file_size` bytes into it.
    async fn receive_file(&mut self, header: &FrameHeader) -> Result<PathBuf, SessionError> {
        let path = self.storage.resolve(&header.file_name);
        let mut file = self
            .storage
            .create(&header.file_name)
            .await
            .map_err(|e| SessionError::storage(&path, e))?;

        let relayed = self.relay_payload(&mut file, &path, header.file_size).await;
        // Flush even on failure so a truncated prefix is on disk when we return.
        let flushed = file
            .flush()
            .await
            .map_err(|e| SessionError::storage(&path, e));
        relayed?;
        flushed?;
        Ok(path)
    }

    async fn relay_payload<W>(
        &mut self,
        file: &mut W,
        path: &Path,
        file_size: u64,
    ) -> Result<(), SessionError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut remaining = file_size;

        while remaining > 0 {
            let want = usize::try_from(remaining)
                .unwrap_or(usize::MAX)
                .min(self.scratch.len());
            let n = within(
                self.read_timeout,
                read_full(&mut self.reader, &mut self.scratch[..want]),
            )
            .await?;
            if n == 0 {
                return Err(
                    io::Error::new(io::ErrorKind::UnexpectedEof, "payload truncated").into(),
                );
            }

            file.write_all(&self.scratch[..n])
                .await
                .map_err(|e| SessionError::storage(path, e))?;
            remaining -= n as u64;
        }

        Ok(())
    }
}

/// Applies the optional per-step timeout.
async fn within<F, T, E>(limit: Option<Duration>, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<io::Error>,
{
    match limit {
        None => fut.await,
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            E::from(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))
        })?,
    }
}
