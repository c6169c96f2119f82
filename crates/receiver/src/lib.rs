//! TCP file upload receiver.
//!
//! A peer connects, sends any number of framed files and then an end
//! marker. Each file is streamed to storage through a fixed-size per-session
//! buffer; nothing is held in memory beyond that buffer.
//!
//! # Wire format
//!
//! See [`wire`] module for the binary protocol specification.

pub mod client;
pub mod error;
pub mod reader;
pub mod server;
pub mod session;
pub mod storage;
pub mod wire;

pub use client::UploadClient;
pub use error::{ClientError, ServerError, SessionError};
pub use reader::read_full;
pub use server::UploadServer;
pub use session::{ReceivedFile, SessionConfig, SessionReport, TransferSession};
pub use storage::{FsStorage, Storage, StorageFuture};
pub use wire::FrameHeader;

use std::time::Duration;

/// Default per-session scratch buffer size (4 KB).
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Write buffer used by the sender (64 KB).
pub const SEND_BUFFER_SIZE: usize = 64 * 1024;

/// Timeout for the sender's TCP connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
