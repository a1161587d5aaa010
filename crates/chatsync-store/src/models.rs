//! Archive records and the parameter structs of the typed helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatsync_shared::ChatKind;

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A conversation known to the archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    /// Chat JID, unique.
    pub jid: String,
    pub kind: ChatKind,
    /// Display name; empty when never resolved.
    pub name: String,
    /// Timestamp of the newest message seen in this chat.
    pub last_message_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single archived message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub chat_jid: String,
    /// Chat name at the time the message was stored, falling back to the
    /// chat's current name.
    pub chat_name: String,
    /// Message id, unique within its chat.
    pub msg_id: String,
    pub sender_jid: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub from_me: bool,
    /// Raw message text (or caption for media).
    pub text: String,
    /// Text rendered for listings, e.g. `[image] caption`.
    pub display_text: String,
    pub media_type: Option<String>,
}

/// Input of [`Database::upsert_message`](crate::Database::upsert_message).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertMessageParams {
    pub chat_jid: String,
    pub chat_name: String,
    pub msg_id: String,
    pub sender_jid: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub from_me: bool,
    pub text: String,
    pub media_type: Option<String>,
    /// Derived from `media_type` and `text` when `None`.
    pub display_text: Option<String>,
}

impl UpsertMessageParams {
    pub fn resolved_display_text(&self) -> String {
        if let Some(display) = &self.display_text {
            return display.clone();
        }
        match self.media_type.as_deref().filter(|m| !m.is_empty()) {
            Some(media) if self.text.is_empty() => format!("[{media}]"),
            Some(media) => format!("[{media}] {}", self.text),
            None => self.text.clone(),
        }
    }
}

/// Input of [`Database::list_messages`](crate::Database::list_messages).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMessagesParams {
    pub chat_jid: String,
    pub limit: usize,
    /// Only messages strictly older than this.
    pub before: Option<DateTime<Utc>>,
    /// Only messages strictly newer than this.
    pub after: Option<DateTime<Utc>>,
}

/// Input of [`Database::search_messages`](crate::Database::search_messages).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMessagesParams {
    pub query: String,
    /// Restrict the search to one chat.
    pub chat_jid: Option<String>,
    pub limit: usize,
}
