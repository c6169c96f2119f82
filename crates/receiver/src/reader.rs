//! Exact-count reads over a byte stream.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Fills `buf` from `reader`, issuing as many reads as it takes.
///
/// Stops early only when a read returns 0 (end of stream). Returns the
/// number of bytes placed in `buf`; anything shorter than `buf.len()` means
/// the stream ended first, and it is up to the caller to decide whether that
/// is fatal. Unlike [`AsyncReadExt::read_exact`], a short count is not an
/// error here.
pub async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn joins_fragmented_reads() {
        let mut mock = Builder::new()
            .read(&[0x01])
            .read(&[0x02, 0x03])
            .read(&[0x04])
            .build();

        let mut buf = [0u8; 4];
        let n = read_full(&mut mock, &mut buf).await.unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
    }

    #[tokio::test]
    async fn short_count_at_end_of_stream() {
        let mut mock = Builder::new().read(b"abc").build();

        let mut buf = [0u8; 8];
        let n = read_full(&mut mock, &mut buf).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..n], b"abc");
    }

    #[tokio::test]
    async fn leaves_surplus_in_stream() {
        let mut cursor: &[u8] = b"headtail";

        let mut head = [0u8; 4];
        assert_eq!(read_full(&mut cursor, &mut head).await.unwrap(), 4);
        assert_eq!(&head, b"head");
        assert_eq!(cursor, b"tail");
    }

    #[tokio::test]
    async fn empty_request_reads_nothing() {
        let mut cursor: &[u8] = b"untouched";
        let n = read_full(&mut cursor, &mut []).await.unwrap();
        assert_eq!(n, 0);
        assert_eq!(cursor, b"untouched");
    }

    #[tokio::test]
    async fn propagates_stream_errors() {
        let mut mock = Builder::new()
            .read(&[0xAA])
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let mut buf = [0u8; 4];
        let err = read_full(&mut mock, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
