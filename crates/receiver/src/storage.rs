//! Destination for received files.
//!
//! A session only needs to create a file by name and write to it in order.
//! [`FsStorage`] does that under a base directory on the local filesystem;
//! tests and embedders can plug in their own [`Storage`].

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::AsyncWrite;

/// A boxed future returned by [`Storage::create`].
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>;

/// Creates destination files for incoming uploads.
pub trait Storage: Send + Sync + 'static {
    /// Sink for one file's payload. Dropping it closes the file.
    type File: AsyncWrite + Unpin + Send;

    /// Where `name` ends up, for logs and error reports.
    fn resolve(&self, name: &str) -> PathBuf;

    /// Creates `name`, truncating any existing content.
    fn create<'a>(&'a self, name: &'a str) -> StorageFuture<'a, Self::File>;
}

/// Writes uploads into a directory on the local filesystem.
///
/// Names are joined onto the base directory as received. A name containing
/// `..` components or an absolute path escapes the base directory; callers
/// that accept untrusted peers must account for that themselves.
#[derive(Debug, Clone)]
pub struct FsStorage {
    base_dir: PathBuf,
}

impl FsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Storage for FsStorage {
    type File = tokio::fs::File;

    fn resolve(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn create<'a>(&'a self, name: &'a str) -> StorageFuture<'a, Self::File> {
        Box::pin(async move { tokio::fs::File::create(self.resolve(name)).await })
    }
}
