//! Upsert and listing of [`Chat`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use chatsync_shared::ChatKind;

use crate::database::{timestamp_column, Database};
use crate::error::Result;
use crate::models::Chat;

impl Database {
    /// Insert or update a chat.
    ///
    /// Idempotent per JID. The kind is always replaced, a blank name never
    /// overwrites a known one, and the last-message timestamp only moves
    /// forward.
    pub fn upsert_chat(
        &self,
        jid: &str,
        kind: ChatKind,
        name: &str,
        last_message_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO chats (jid, kind, name, last_message_ts)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(jid) DO UPDATE SET
                kind = excluded.kind,
                name = CASE WHEN excluded.name <> '' THEN excluded.name ELSE chats.name END,
                last_message_ts = MAX(chats.last_message_ts, excluded.last_message_ts)",
            params![jid, kind.as_str(), name, last_message_at.timestamp()],
        )?;
        Ok(())
    }

    /// List chats whose name or JID contains `filter` (all chats when the
    /// filter is blank), most recently active first.
    pub fn list_chats(&self, filter: &str, limit: usize) -> Result<Vec<Chat>> {
        let filter = filter.trim();
        let pattern = format!("%{}%", escape_like(filter));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT jid, kind, name, last_message_ts
             FROM chats
             WHERE ?1 = '' OR name LIKE ?2 ESCAPE '\\' OR jid LIKE ?2 ESCAPE '\\'
             ORDER BY last_message_ts DESC, jid ASC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![filter, pattern, limit as i64], row_to_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    pub fn count_chats(&self) -> Result<i64> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))?;
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Map a `rusqlite::Row` to a [`Chat`].
fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let jid: String = row.get(0)?;
    let kind_str: String = row.get(1)?;
    let name: String = row.get(2)?;
    let ts: i64 = row.get(3)?;

    let kind = kind_str.parse::<ChatKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Chat {
        jid,
        kind,
        name,
        last_message_at: timestamp_column(ts, 3)?,
    })
}
