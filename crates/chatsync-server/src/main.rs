//! `chatsync-server`: serve an existing archive over HTTP RPC.
//!
//! Runs without a chat client, so `/send` answers 503 until an embedding
//! application binds one.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use chatsync_server::{logging, Options, RpcConfig, Server};
use chatsync_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = RpcConfig::from_env();
    info!(?config, "Loaded configuration");

    let db = match &config.db_path {
        Some(path) => Database::open_at(path),
        None => Database::open_default(),
    }
    .context("failed to open archive")?;

    let server = Server::new(Options {
        addr: config.rpc_addr.clone(),
        store: Some(Arc::new(db)),
        request_timeout: config.request_timeout,
        max_body_bytes: config.max_body_bytes,
        ..Default::default()
    })?;

    let addr = server.start().await?;
    eprintln!("chatsync RPC listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down");

    server.stop(config.shutdown_timeout).await?;
    Ok(())
}
