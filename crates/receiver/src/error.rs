//! Error types for upload sessions and the listener.

use std::path::PathBuf;

/// Reasons an upload session stops before its sentinel.
///
/// Every variant is terminal for the session; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A protocol field could not be read in full.
    #[error("framing error: {0}")]
    Framing(&'static str),

    /// A field was read in full but holds an invalid value.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The stream failed or ended while payload bytes were still owed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The destination file could not be created or written.
    #[error("storage error for {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Errors produced by the upload listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by the upload client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("protocol error: {0}")]
    Protocol(String),
}
