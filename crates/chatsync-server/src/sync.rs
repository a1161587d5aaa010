//! Background sync: connect the chat client, hand it to the RPC server, and
//! write the chats and messages it reports into the archive.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Span};

use chatsync_shared::ChatKind;
use chatsync_store::UpsertMessageParams;

use crate::client::ChatClient;
use crate::server::Server;
use crate::state::SyncFlag;
use crate::store::Store;

/// Something the live client learned that belongs in the archive.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Chat {
        jid: String,
        kind: ChatKind,
        name: String,
        last_message_at: DateTime<Utc>,
    },
    Message(UpsertMessageParams),
}

/// An authenticated client and the event stream it feeds.
pub struct SyncSession {
    pub client: Arc<dyn ChatClient>,
    pub events: mpsc::Receiver<SyncEvent>,
}

/// Authenticates the protocol client. Implemented by the client integration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<SyncSession, SyncError>;
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("connect failed: {0}")]
    Connect(String),
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Stop after this long without an event.
    pub idle_exit: Option<Duration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub chats_stored: u64,
    pub messages_stored: u64,
}

/// Clears the sync flag however the loop exits.
struct RunningGuard(SyncFlag);

impl RunningGuard {
    fn set(flag: SyncFlag) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Run one sync session against `server`'s store until the event stream
/// closes, `shutdown` resolves, or the session goes idle.
pub async fn run_sync<C, F>(
    server: &Server,
    connector: &C,
    options: SyncOptions,
    shutdown: F,
) -> Result<SyncReport, SyncError>
where
    C: Connector + ?Sized,
    F: Future<Output = ()> + Send,
{
    let span = server.span().clone();
    let SyncSession { client, mut events } = connector.connect().await?;

    server.bind_client(client);
    let _running = RunningGuard::set(server.sync_flag());
    info!(parent: &span, idle_exit = ?options.idle_exit, "Sync started");

    let store = server.store();
    let mut report = SyncReport::default();
    tokio::pin!(shutdown);

    loop {
        let next = tokio::select! {
            _ = &mut shutdown => {
                info!(parent: &span, "Sync interrupted by shutdown");
                break;
            }
            next = recv(&mut events, options.idle_exit) => next,
        };

        let event = match next {
            Next::Event(event) => event,
            Next::Closed => {
                info!(parent: &span, "Sync event stream closed");
                break;
            }
            Next::Idle => {
                info!(parent: &span, idle_exit = ?options.idle_exit, "Sync idle, exiting");
                break;
            }
        };

        match apply(&store, event, &span).await {
            Ok(Applied::Chat) => report.chats_stored += 1,
            Ok(Applied::Message) => report.messages_stored += 1,
            Err(e) => warn!(parent: &span, error = %e, "Failed to store sync event"),
        }
    }

    info!(
        parent: &span,
        chats = report.chats_stored,
        messages = report.messages_stored,
        "Sync finished"
    );
    Ok(report)
}

enum Next {
    Event(SyncEvent),
    Closed,
    Idle,
}

async fn recv(events: &mut mpsc::Receiver<SyncEvent>, idle_exit: Option<Duration>) -> Next {
    let received = match idle_exit {
        Some(idle) => match tokio::time::timeout(idle, events.recv()).await {
            Ok(received) => received,
            Err(_) => return Next::Idle,
        },
        None => events.recv().await,
    };
    received.map_or(Next::Closed, Next::Event)
}

enum Applied {
    Chat,
    Message,
}

async fn apply(store: &Arc<dyn Store>, event: SyncEvent, span: &Span) -> Result<Applied, String> {
    let store = Arc::clone(store);
    let span = span.clone();
    tokio::task::spawn_blocking(move || match event {
        SyncEvent::Chat {
            jid,
            kind,
            name,
            last_message_at,
        } => {
            debug!(parent: &span, chat = %jid, "Storing chat");
            store
                .upsert_chat(&jid, kind, &name, last_message_at)
                .map(|()| Applied::Chat)
                .map_err(|e| e.to_string())
        }
        SyncEvent::Message(params) => {
            debug!(parent: &span, chat = %params.chat_jid, msg_id = %params.msg_id, "Storing message");
            store
                .upsert_message(&params)
                .map(|()| Applied::Message)
                .map_err(|e| e.to_string())
        }
    })
    .await
    .map_err(|e| format!("store task failed: {e}"))?
}
