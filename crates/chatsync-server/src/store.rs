//! The archive operations the RPC layer and the sync driver depend on.
//!
//! Implementations must tolerate concurrent callers: request handlers and
//! the sync writer call in from different blocking threads at once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task;

use chatsync_shared::ChatKind;
use chatsync_store::{
    Chat, Database, ListMessagesParams, Message, SearchMessagesParams, StoreError,
    UpsertMessageParams,
};

use crate::error::ApiError;

pub type StoreResult<T> = Result<T, StoreError>;

pub trait Store: Send + Sync + 'static {
    fn upsert_chat(
        &self,
        jid: &str,
        kind: ChatKind,
        name: &str,
        last_message_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    fn upsert_message(&self, params: &UpsertMessageParams) -> StoreResult<()>;

    fn list_chats(&self, filter: &str, limit: usize) -> StoreResult<Vec<Chat>>;

    fn list_messages(&self, params: &ListMessagesParams) -> StoreResult<Vec<Message>>;

    fn search_messages(&self, params: &SearchMessagesParams) -> StoreResult<Vec<Message>>;

    fn count_chats(&self) -> StoreResult<i64>;

    fn count_messages(&self) -> StoreResult<i64>;

    fn has_fts(&self) -> bool;
}

impl Store for Database {
    fn upsert_chat(
        &self,
        jid: &str,
        kind: ChatKind,
        name: &str,
        last_message_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        Database::upsert_chat(self, jid, kind, name, last_message_at)
    }

    fn upsert_message(&self, params: &UpsertMessageParams) -> StoreResult<()> {
        Database::upsert_message(self, params)
    }

    fn list_chats(&self, filter: &str, limit: usize) -> StoreResult<Vec<Chat>> {
        Database::list_chats(self, filter, limit)
    }

    fn list_messages(&self, params: &ListMessagesParams) -> StoreResult<Vec<Message>> {
        Database::list_messages(self, params)
    }

    fn search_messages(&self, params: &SearchMessagesParams) -> StoreResult<Vec<Message>> {
        Database::search_messages(self, params)
    }

    fn count_chats(&self) -> StoreResult<i64> {
        Database::count_chats(self)
    }

    fn count_messages(&self) -> StoreResult<i64> {
        Database::count_messages(self)
    }

    fn has_fts(&self) -> bool {
        Database::has_fts(self)
    }
}

/// Run a store call on the blocking pool.
///
/// The closure keeps running to completion even if the awaiting request is
/// dropped.
pub async fn blocking<T, F>(store: &Arc<dyn Store>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn Store) -> T + Send + 'static,
{
    let store = Arc::clone(store);
    task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))
}
