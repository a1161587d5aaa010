//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts with zero
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use chatsync_shared::constants::DEFAULT_RPC_ADDR;

use crate::server::{DEFAULT_MAX_BODY_BYTES, DEFAULT_REQUEST_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    /// Listen address.
    /// Env: `CHATSYNC_RPC_ADDR`
    /// Default: `localhost:5555`
    pub rpc_addr: String,

    /// Archive database file.
    /// Env: `CHATSYNC_DB`
    /// Default: `None`, meaning the platform data directory.
    pub db_path: Option<PathBuf>,

    /// How long Stop waits for in-flight requests.
    /// Env: `CHATSYNC_SHUTDOWN_TIMEOUT_SECS`
    /// Default: 5 s
    pub shutdown_timeout: Duration,

    /// Upper bound on any single request.
    /// Env: `CHATSYNC_REQUEST_TIMEOUT_SECS`
    /// Default: 60 s
    pub request_timeout: Duration,

    /// Largest accepted request body.
    /// Env: `CHATSYNC_MAX_BODY_BYTES`
    /// Default: 1 MiB
    pub max_body_bytes: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_addr: DEFAULT_RPC_ADDR.to_string(),
            db_path: None,
            shutdown_timeout: Duration::from_secs(5),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl RpcConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("CHATSYNC_RPC_ADDR") {
            if !addr.trim().is_empty() {
                config.rpc_addr = addr.trim().to_string();
            }
        }

        if let Some(path) = lookup("CHATSYNC_DB") {
            if !path.trim().is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(secs) = positive("CHATSYNC_SHUTDOWN_TIMEOUT_SECS", lookup("CHATSYNC_SHUTDOWN_TIMEOUT_SECS")) {
            config.shutdown_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = positive("CHATSYNC_REQUEST_TIMEOUT_SECS", lookup("CHATSYNC_REQUEST_TIMEOUT_SECS")) {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(bytes) = positive("CHATSYNC_MAX_BODY_BYTES", lookup("CHATSYNC_MAX_BODY_BYTES")) {
            match usize::try_from(bytes) {
                Ok(bytes) => config.max_body_bytes = bytes,
                Err(_) => tracing::warn!(value = bytes, "CHATSYNC_MAX_BODY_BYTES too large, using default"),
            }
        }

        // CHATSYNC_LOG and RUST_LOG are read by the logging setup.

        config
    }
}

/// A strictly positive integer, or `None` (with a warning when a value was
/// present but unusable).
fn positive(key: &str, value: Option<String>) -> Option<u64> {
    let value = value?;
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %value, "Invalid value, using default");
            None
        }
    }
}
