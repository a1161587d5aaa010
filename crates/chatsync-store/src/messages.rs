use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::{timestamp_column, Database};
use crate::error::Result;
use crate::models::{ListMessagesParams, Message, UpsertMessageParams};

/// Column list shared by every message query. Expects `messages m LEFT JOIN
/// chats c ON c.jid = m.chat_jid`; the join tolerates a chat row that has
/// not landed yet.
pub(crate) const MESSAGE_COLUMNS: &str =
    "m.chat_jid, COALESCE(NULLIF(m.chat_name, ''), c.name, ''), m.msg_id, m.sender_jid,
     m.sender_name, m.ts, m.from_me, m.text, m.display_text, m.media_type";

impl Database {
    /// Insert or update a message, keyed by (chat JID, message id).
    ///
    /// Blank chat and sender names never overwrite known ones.
    pub fn upsert_message(&self, p: &UpsertMessageParams) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO messages (chat_jid, chat_name, msg_id, sender_jid, sender_name,
                                   ts, from_me, text, display_text, media_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(chat_jid, msg_id) DO UPDATE SET
                chat_name = CASE WHEN excluded.chat_name <> '' THEN excluded.chat_name ELSE messages.chat_name END,
                sender_jid = CASE WHEN excluded.sender_jid <> '' THEN excluded.sender_jid ELSE messages.sender_jid END,
                sender_name = CASE WHEN excluded.sender_name <> '' THEN excluded.sender_name ELSE messages.sender_name END,
                ts = excluded.ts,
                from_me = excluded.from_me,
                text = excluded.text,
                display_text = excluded.display_text,
                media_type = COALESCE(excluded.media_type, messages.media_type)",
            params![
                p.chat_jid,
                p.chat_name,
                p.msg_id,
                p.sender_jid,
                p.sender_name,
                p.timestamp.timestamp(),
                p.from_me,
                p.text,
                p.resolved_display_text(),
                p.media_type,
            ],
        )?;
        Ok(())
    }

    /// The newest `limit` messages of a chat inside the optional bounds,
    /// returned oldest first.
    pub fn list_messages(&self, p: &ListMessagesParams) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages m
             LEFT JOIN chats c ON c.jid = m.chat_jid
             WHERE m.chat_jid = ?1
               AND (?2 IS NULL OR m.ts < ?2)
               AND (?3 IS NULL OR m.ts > ?3)
             ORDER BY m.ts DESC, m.id DESC
             LIMIT ?4"
        ))?;

        let rows = stmt.query_map(
            params![
                p.chat_jid,
                p.before.map(ceil_secs),
                p.after.map(|t| t.timestamp()),
                p.limit as i64,
            ],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        messages.reverse();
        Ok(messages)
    }

    pub fn count_messages(&self) -> Result<i64> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Stored timestamps are whole seconds, so an exclusive upper bound with a
/// fractional part rounds up to keep the second it falls in.
fn ceil_secs(t: DateTime<Utc>) -> i64 {
    if t.timestamp_subsec_nanos() > 0 {
        t.timestamp() + 1
    } else {
        t.timestamp()
    }
}

/// Map a row selected with [`MESSAGE_COLUMNS`] to a [`Message`].
pub(crate) fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let ts: i64 = row.get(5)?;

    Ok(Message {
        chat_jid: row.get(0)?,
        chat_name: row.get(1)?,
        msg_id: row.get(2)?,
        sender_jid: row.get(3)?,
        sender_name: row.get(4)?,
        timestamp: timestamp_column(ts, 5)?,
        from_me: row.get(6)?,
        text: row.get(7)?,
        display_text: row.get(8)?,
        media_type: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::database::test_db;

    fn msg(id: &str, text: &str, minute: u32) -> UpsertMessageParams {
        UpsertMessageParams {
            chat_jid: "123@s.whatsapp.net".into(),
            chat_name: "Alice".into(),
            msg_id: id.into(),
            sender_jid: "123@s.whatsapp.net".into(),
            sender_name: "Alice".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 2, 7, 20, minute, 0).unwrap(),
            text: text.into(),
            ..Default::default()
        }
    }

    fn params(limit: usize) -> ListMessagesParams {
        ListMessagesParams {
            chat_jid: "123@s.whatsapp.net".into(),
            limit,
            before: None,
            after: None,
        }
    }

    #[test]
    fn upsert_same_id_does_not_duplicate() {
        let (_dir, db) = test_db();

        db.upsert_message(&msg("m1", "Hello!", 0)).unwrap();
        db.upsert_message(&msg("m1", "Hello, edited", 0)).unwrap();

        let messages = db.list_messages(&params(50)).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "Hello, edited");
        assert_eq!(db.count_messages().unwrap(), 1);
    }

    #[test]
    fn same_id_in_other_chat_is_distinct() {
        let (_dir, db) = test_db();

        db.upsert_message(&msg("m1", "one", 0)).unwrap();
        let mut other = msg("m1", "two", 0);
        other.chat_jid = "456@g.us".into();
        db.upsert_message(&other).unwrap();

        assert_eq!(db.count_messages().unwrap(), 2);
    }

    #[test]
    fn list_returns_newest_page_in_chronological_order() {
        let (_dir, db) = test_db();
        for minute in 0..5 {
            db.upsert_message(&msg(&format!("m{minute}"), "x", minute)).unwrap();
        }

        let page = db.list_messages(&params(3)).unwrap();
        let ids: Vec<_> = page.iter().map(|m| m.msg_id.as_str()).collect();
        assert_eq!(ids, ["m2", "m3", "m4"]);
    }

    #[test]
    fn list_honours_before_and_after() {
        let (_dir, db) = test_db();
        for minute in 0..5 {
            db.upsert_message(&msg(&format!("m{minute}"), "x", minute)).unwrap();
        }
        let base = Utc.with_ymd_and_hms(2026, 2, 7, 20, 0, 0).unwrap();

        let mut p = params(50);
        p.after = Some(base + Duration::minutes(1));
        p.before = Some(base + Duration::minutes(4));
        let ids: Vec<_> = db
            .list_messages(&p)
            .unwrap()
            .into_iter()
            .map(|m| m.msg_id)
            .collect();
        assert_eq!(ids, ["m2", "m3"]);
    }

    #[test]
    fn fractional_before_keeps_message_in_that_second() {
        let (_dir, db) = test_db();
        db.upsert_message(&msg("m0", "x", 0)).unwrap();
        let base = Utc.with_ymd_and_hms(2026, 2, 7, 20, 0, 0).unwrap();

        let mut p = params(50);
        p.before = Some(base + Duration::milliseconds(500));
        assert_eq!(db.list_messages(&p).unwrap().len(), 1);

        p.before = Some(base);
        assert!(db.list_messages(&p).unwrap().is_empty());

        p.before = None;
        p.after = Some(base + Duration::milliseconds(500));
        assert!(db.list_messages(&p).unwrap().is_empty());
    }

    #[test]
    fn chat_name_falls_back_to_chat_row() {
        let (_dir, db) = test_db();
        db.upsert_chat("123@s.whatsapp.net", chatsync_shared::ChatKind::Dm, "Alice A.", Utc::now())
            .unwrap();

        let mut m = msg("m1", "hi", 0);
        m.chat_name = String::new();
        m.media_type = Some("image".into());
        db.upsert_message(&m).unwrap();

        let stored = &db.list_messages(&params(50)).unwrap()[0];
        assert_eq!(stored.chat_name, "Alice A.");
        assert_eq!(stored.display_text, "[image] hi");
        assert_eq!(stored.media_type.as_deref(), Some("image"));
    }
}
