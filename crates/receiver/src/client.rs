//! Upload sender.
//!
//! Connects to an upload listener and streams local files using the frame
//! format in [`wire`](crate::wire).

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ClientError;
use crate::wire::{FrameHeader, write_end_marker, write_frame_header};
use crate::{CONNECT_TIMEOUT, SEND_BUFFER_SIZE};

/// Sends files to an upload listener.
pub struct UploadClient;

impl UploadClient {
    /// Connects to `addr`, streams every file, then sends the end marker.
    ///
    /// `files` is a list of `(local_path, remote_name)` pairs. Every file is
    /// opened before connecting, so a missing file sends nothing. Waits until
    /// the receiver closes the connection and returns the payload bytes sent.
    pub async fn send_files(
        addr: SocketAddr,
        files: &[(PathBuf, String)],
        cancel: CancellationToken,
    ) -> Result<u64, ClientError> {
        let mut sources = Vec::with_capacity(files.len());
        for (local_path, name) in files {
            let file = tokio::fs::File::open(local_path).await?;
            let file_size = file.metadata().await?.len();
            sources.push((name.clone(), file_size, file));
        }

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ClientError::Cancelled);
            }
            result = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)) => {
                match result {
                    Ok(Ok(s)) => {
                        info!(%addr, "upload connection established");
                        s
                    }
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => return Err(ClientError::Timeout),
                }
            }
        };

        let (mut reader, writer) = stream.into_split();
        let mut writer = BufWriter::with_capacity(SEND_BUFFER_SIZE, writer);

        let total_bytes = Self::send_stream(&mut writer, sources, &cancel).await?;
        writer.shutdown().await?;

        // The receiver closes its side once the session is over.
        let mut rest = [0u8; 1];
        while reader.read(&mut rest).await? > 0 {}

        info!(total_bytes, "upload complete");
        Ok(total_bytes)
    }

    /// Writes a whole session to `writer`: one frame per
    /// `(name, file_size, source)`, then the end marker.
    ///
    /// Sources can be files, in-memory slices or any other reader. Returns
    /// the payload bytes written. `writer` is flushed but not shut down.
    pub async fn send_stream<W, R, I>(
        writer: &mut W,
        sources: I,
        cancel: &CancellationToken,
    ) -> Result<u64, ClientError>
    where
        W: AsyncWrite + Unpin,
        R: AsyncRead + Unpin,
        I: IntoIterator<Item = (String, u64, R)>,
    {
        let mut total_bytes = 0u64;
        for (name, file_size, source) in sources {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            total_bytes += Self::send_one(writer, &name, file_size, source, cancel).await?;
            debug!(name = %name, size = file_size, "file sent");
        }

        write_end_marker(writer).await?;
        writer.flush().await?;
        Ok(total_bytes)
    }

    /// Writes one frame: the header, then exactly `file_size` bytes from
    /// `source`.
    pub async fn send_one<W, R>(
        writer: &mut W,
        name: &str,
        file_size: u64,
        mut source: R,
        cancel: &CancellationToken,
    ) -> Result<u64, ClientError>
    where
        W: AsyncWrite + Unpin,
        R: AsyncRead + Unpin,
    {
        let header = FrameHeader {
            file_name: name.to_owned(),
            file_size,
        };
        write_frame_header(writer, &header)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidInput => ClientError::Protocol(e.to_string()),
                _ => ClientError::Io(e),
            })?;

        let mut buf = vec![0u8; SEND_BUFFER_SIZE];
        let mut remaining = file_size;
        while remaining > 0 {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let to_read = usize::try_from(remaining)
                .unwrap_or(usize::MAX)
                .min(buf.len());
            let n = source.read(&mut buf[..to_read]).await?;
            if n == 0 {
                return Err(ClientError::Protocol(format!(
                    "{name}: source ended {remaining} bytes early"
                )));
            }

            writer.write_all(&buf[..n]).await?;
            remaining -= n as u64;
        }

        Ok(file_size)
    }
}
