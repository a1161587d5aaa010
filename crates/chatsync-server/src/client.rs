//! The live chat client as seen by the RPC layer.
//!
//! The protocol client is authenticated asynchronously by the sync task,
//! so the server starts without one and has it bound later through a
//! [`ClientBinding`].

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use chatsync_shared::Jid;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Send(String),
}

/// Operations the RPC layer needs from the messaging client.
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Deliver a text message and return the message id assigned to it.
    async fn send_text(&self, to: &Jid, text: &str) -> Result<String, ClientError>;

    /// Best display name for a chat; `fallback` when nothing better is known.
    async fn resolve_chat_name(&self, chat: &Jid, fallback: &str) -> String;
}

/// Swappable, optional reference to the live client.
///
/// Readers take a snapshot under the shared lock and release it before
/// using the client; the lock is never held across an `.await`.
#[derive(Clone, Default)]
pub struct ClientBinding {
    inner: Arc<RwLock<Option<Arc<dyn ChatClient>>>>,
}

impl ClientBinding {
    pub fn new(client: Option<Arc<dyn ChatClient>>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(client)),
        }
    }

    /// Replace the bound client.
    pub fn bind(&self, client: Arc<dyn ChatClient>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
    }

    pub fn snapshot(&self) -> Option<Arc<dyn ChatClient>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the client, only if it reports itself connected.
    pub fn connected(&self) -> Option<Arc<dyn ChatClient>> {
        self.snapshot().filter(|client| client.is_connected())
    }
}
