//! State shared by every request handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::Span;

use crate::client::ClientBinding;
use crate::store::Store;

/// Whether a background sync task is running. A coarse liveness indicator
/// for `/status`; it does not gate store access.
#[derive(Clone, Default)]
pub struct SyncFlag(Arc<AtomicBool>);

impl SyncFlag {
    pub fn set(&self, running: bool) {
        self.0.store(running, Ordering::Release);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub client: ClientBinding,
    pub sync_running: SyncFlag,
    pub started_at: Instant,
    /// Parent span of every event the handlers log.
    pub span: Span,
}
