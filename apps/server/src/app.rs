//! Application orchestrator: wires config, storage and listener together.

use filedrop_receiver::{FsStorage, UploadServer};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Runs the upload server until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    // -- Storage --
    tokio::fs::create_dir_all(&config.storage_dir).await?;
    let storage = FsStorage::new(&config.storage_dir);

    // -- Listener --
    let server = UploadServer::bind(
        config.listen_addr(),
        storage,
        config.session_config(),
        cancel.clone(),
    )
    .await?;
    tracing::info!(
        addr = %server.local_addr()?,
        "server started, waiting for connections"
    );

    let server_task = tokio::spawn(server.run());

    // -- Main loop: wait for shutdown --
    tokio::signal::ctrl_c().await?;
    tracing::info!("SIGINT received, shutting down");

    cancel.cancel();
    server_task.await??;

    Ok(())
}
