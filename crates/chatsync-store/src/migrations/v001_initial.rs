//! v001 -- Initial schema creation.
//!
//! Creates the two archive tables: `chats` and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    jid             TEXT PRIMARY KEY NOT NULL,
    kind            TEXT NOT NULL,               -- dm | group | broadcast
    name            TEXT NOT NULL DEFAULT '',
    last_message_ts INTEGER NOT NULL DEFAULT 0   -- unix seconds
);

CREATE INDEX IF NOT EXISTS idx_chats_last_message
    ON chats(last_message_ts DESC);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
-- No foreign key to chats: the sync writer may store a message a moment
-- before its chat row lands.
CREATE TABLE IF NOT EXISTS messages (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_jid     TEXT NOT NULL,
    chat_name    TEXT NOT NULL DEFAULT '',
    msg_id       TEXT NOT NULL,
    sender_jid   TEXT NOT NULL DEFAULT '',
    sender_name  TEXT NOT NULL DEFAULT '',
    ts           INTEGER NOT NULL,               -- unix seconds
    from_me      INTEGER NOT NULL DEFAULT 0,     -- boolean 0/1
    text         TEXT NOT NULL DEFAULT '',
    display_text TEXT NOT NULL DEFAULT '',
    media_type   TEXT,

    UNIQUE (chat_jid, msg_id)
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
    ON messages(chat_jid, ts DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
