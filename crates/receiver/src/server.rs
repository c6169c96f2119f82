//! TCP upload listener.
//!
//! Accepts connections until cancelled and runs one [`TransferSession`] per
//! connection on its own task. Sessions share nothing but the storage.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::session::{SessionConfig, TransferSession};
use crate::storage::Storage;

/// Listener that stores every upload it receives into `S`.
pub struct UploadServer<S> {
    listener: TcpListener,
    storage: Arc<S>,
    session: SessionConfig,
    cancel: CancellationToken,
}

impl<S: Storage> UploadServer<S> {
    /// Binds the listener. Port 0 picks an ephemeral port; see
    /// [`local_addr`](Self::local_addr).
    pub async fn bind(
        addr: SocketAddr,
        storage: S,
        session: SessionConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "upload listener bound");

        Ok(Self {
            listener,
            storage: Arc::new(storage),
            session,
            cancel,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the cancellation token fires.
    ///
    /// Sessions still running at that point are aborted, which closes their
    /// streams and any open destination file.
    pub async fn run(self) -> Result<(), ServerError> {
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(active = sessions.len(), "upload listener shutting down");
                    sessions.shutdown().await;
                    break Ok(());
                }

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!("session task failed: {e}");
                    }
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            info!(%peer_addr, "connection accepted");
                            sessions.spawn(serve_connection(
                                stream,
                                peer_addr,
                                Arc::clone(&self.storage),
                                self.session.clone(),
                            ));
                        }
                        Err(e) => {
                            error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }
}

/// Runs one session and logs how it ended. The stream is dropped on return.
async fn serve_connection<S: Storage>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    storage: Arc<S>,
    config: SessionConfig,
) {
    match TransferSession::new(stream, storage, &config).run().await {
        Ok(report) => {
            info!(
                %peer_addr,
                files = report.files.len(),
                bytes = report.total_bytes,
                "session complete"
            );
        }
        Err(e) => {
            warn!(%peer_addr, "session failed: {e}");
        }
    }
    debug!(%peer_addr, "connection released");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsStorage;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn frame(name: &str, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(name.len() as i32).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&(payload.len() as i32).to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    type ServerHandle = tokio::task::JoinHandle<Result<(), ServerError>>;

    async fn start(dir: &std::path::Path) -> (SocketAddr, CancellationToken, ServerHandle) {
        let cancel = CancellationToken::new();
        let server = UploadServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            FsStorage::new(dir),
            SessionConfig::default(),
            cancel.clone(),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(server.run());
        (addr, cancel, handle)
    }

    /// Sends raw bytes and waits for the server to drop the connection.
    async fn send_and_wait(addr: SocketAddr, bytes: &[u8]) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(bytes).await.unwrap();
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    }

    #[tokio::test]
    async fn receives_upload_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let (addr, cancel, handle) = start(dir.path()).await;

        let mut bytes = frame("hello.txt", b"hello over tcp");
        bytes.extend_from_slice(&(-1i32).to_le_bytes());
        send_and_wait(addr, &bytes).await;

        let stored = std::fs::read(dir.path().join("hello.txt")).unwrap();
        assert_eq!(stored, b"hello over tcp");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_session_does_not_affect_others() {
        let dir = tempfile::tempdir().unwrap();
        let (addr, cancel, handle) = start(dir.path()).await;

        // Negative size on the first connection.
        let mut bad = 7i32.to_le_bytes().to_vec();
        bad.extend_from_slice(b"bad.txt");
        bad.extend_from_slice(&(-5i32).to_le_bytes());
        send_and_wait(addr, &bad).await;

        let mut good = frame("good.txt", b"fine");
        good.extend_from_slice(&(-1i32).to_le_bytes());
        send_and_wait(addr, &good).await;

        assert!(!dir.path().join("bad.txt").exists());
        assert_eq!(std::fs::read(dir.path().join("good.txt")).unwrap(), b"fine");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn concurrent_connections() {
        let dir = tempfile::tempdir().unwrap();
        let (addr, cancel, handle) = start(dir.path()).await;

        let mut clients = Vec::new();
        for i in 0..8 {
            clients.push(tokio::spawn(async move {
                let payload = vec![i as u8; 20_000];
                let mut bytes = frame(&format!("client{i}.bin"), &payload);
                bytes.extend_from_slice(&(-1i32).to_le_bytes());
                send_and_wait(addr, &bytes).await;
            }));
        }
        for c in clients {
            c.await.unwrap();
        }

        for i in 0..8u8 {
            let stored = std::fs::read(dir.path().join(format!("client{i}.bin"))).unwrap();
            assert_eq!(stored, vec![i; 20_000]);
        }

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_aborts_stalled_session() {
        let dir = tempfile::tempdir().unwrap();
        let (addr, cancel, handle) = start(dir.path()).await;

        // Open a connection and send half a length field, then stall.
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&[0x01, 0x00]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        cancel.cancel();
        handle.await.unwrap().unwrap();

        // The aborted session closed its end.
        let mut buf = [0u8; 1];
        let n = stream.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }
}
