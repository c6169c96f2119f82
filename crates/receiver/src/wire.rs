//! TCP wire format for file uploads.
//!
//! # Wire format
//!
//! ```text
//! PER FILE (sender -> receiver):
//!   [4 bytes LE i32: name_len]
//!   [name_len bytes: file name UTF-8]
//!   [4 bytes LE i32: file_size]
//!   [file_size bytes: raw file data]
//!
//! END MARKER: [4 bytes LE i32: -1]
//! ```
//!
//! There is no handshake, version byte or magic. A connection is just a
//! sequence of frames terminated by the end marker. Closing the stream
//! without the marker, even between frames, is a framing error.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::SessionError;
use crate::reader::read_full;

/// `name_len` value that ends a session.
pub const END_MARKER: i32 = -1;

/// Size of each integer field on the wire.
pub const FIELD_LEN: usize = 4;

/// Decoded header of one frame. The payload follows it on the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// File name as sent, not sanitized.
    pub file_name: String,
    /// Payload length in bytes.
    pub file_size: u64,
}

/// Reads one LE i32 through `scratch`.
///
/// Any short count, including an empty stream, is `Framing(incomplete)`.
async fn read_i32_field<R>(
    reader: &mut R,
    scratch: &mut [u8],
    incomplete: &'static str,
) -> Result<i32, SessionError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let field = &mut scratch[..FIELD_LEN];
    if read_full(reader, field).await? != FIELD_LEN {
        return Err(SessionError::Framing(incomplete));
    }
    Ok(i32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}

/// Reads the next frame header, using `scratch` for every field.
///
/// Returns `None` if the end marker is encountered. The stream ending
/// anywhere else, even right before a frame, is a framing error.
///
/// `scratch` must hold at least [`FIELD_LEN`] bytes, and bounds the
/// accepted file name length.
pub async fn read_frame_header<R>(
    reader: &mut R,
    scratch: &mut [u8],
) -> Result<Option<FrameHeader>, SessionError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let name_len = match read_i32_field(reader, scratch, "incomplete length field").await? {
        END_MARKER => return Ok(None),
        n if n < 0 => {
            return Err(SessionError::Protocol(format!(
                "negative file name length: {n}"
            )));
        }
        n => n as usize,
    };

    if name_len > scratch.len() {
        return Err(SessionError::Protocol(format!(
            "file name too long: {name_len} bytes (max {})",
            scratch.len()
        )));
    }

    let name_buf = &mut scratch[..name_len];
    if read_full(reader, name_buf).await? != name_len {
        return Err(SessionError::Framing("incomplete file name"));
    }
    // Invalid sequences become U+FFFD; the file is still stored.
    let file_name = String::from_utf8_lossy(name_buf).into_owned();

    let file_size = read_i32_field(reader, scratch, "incomplete size field").await?;
    if file_size < 0 {
        return Err(SessionError::Protocol(format!(
            "negative file size: {file_size}"
        )));
    }

    Ok(Some(FrameHeader {
        file_name,
        file_size: file_size as u64,
    }))
}

/// Writes a frame header. The caller streams the payload afterwards.
pub async fn write_frame_header<W>(writer: &mut W, header: &FrameHeader) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let name = header.file_name.as_bytes();
    let name_len = i32::try_from(name.len()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("file name too long: {} bytes", name.len()),
        )
    })?;
    let file_size = i32::try_from(header.file_size).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("file too large: {} bytes (max {})", header.file_size, i32::MAX),
        )
    })?;

    writer.write_i32_le(name_len).await?;
    writer.write_all(name).await?;
    writer.write_i32_le(file_size).await?;
    Ok(())
}

/// Writes the end-of-session marker.
pub async fn write_end_marker<W>(writer: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_i32_le(END_MARKER).await
}
