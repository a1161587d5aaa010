//! Message search: FTS5 when the index exists, `LIKE` otherwise.
//!
//! Every whitespace-separated term of the query must match. Terms are
//! quoted before they reach FTS5 so user input cannot inject query syntax,
//! and matched as word prefixes so a partial word still finds its message.

use rusqlite::params;
use tracing::debug;

use crate::chats::escape_like;
use crate::database::Database;
use crate::error::Result;
use crate::messages::{row_to_message, MESSAGE_COLUMNS};
use crate::models::{Message, SearchMessagesParams};

impl Database {
    /// Search message text, newest first.
    ///
    /// Each term matches the start of a word (`wor` finds "world") on both
    /// paths. The `LIKE` fallback also matches inside words (`orld`); the
    /// FTS5 index does not.
    pub fn search_messages(&self, p: &SearchMessagesParams) -> Result<Vec<Message>> {
        let terms: Vec<&str> = p.query.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let chat = p.chat_jid.as_deref().map(str::trim).unwrap_or("");

        if self.has_fts() {
            self.search_fts(&terms, chat, p.limit)
        } else {
            self.search_like(&terms, chat, p.limit)
        }
    }

    fn search_fts(&self, terms: &[&str], chat: &str, limit: usize) -> Result<Vec<Message>> {
        // Pure punctuation never reaches the index as a token.
        let terms: Vec<&str> = terms
            .iter()
            .copied()
            .filter(|t| t.chars().any(char::is_alphanumeric))
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = fts_match_expr(&terms);
        debug!(expr = %match_expr, "fts search");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages_fts f
             JOIN messages m ON m.id = f.rowid
             LEFT JOIN chats c ON c.jid = m.chat_jid
             WHERE messages_fts MATCH ?1
               AND (?2 = '' OR m.chat_jid = ?2)
             ORDER BY m.ts DESC, m.id DESC
             LIMIT ?3"
        ))?;

        let rows = stmt.query_map(params![match_expr, chat, limit as i64], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    fn search_like(&self, terms: &[&str], chat: &str, limit: usize) -> Result<Vec<Message>> {
        // One (text OR display_text) clause per term, ANDed together.
        let mut sql = format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages m
             LEFT JOIN chats c ON c.jid = m.chat_jid
             WHERE (?1 = '' OR m.chat_jid = ?1)"
        );
        let mut values: Vec<String> = vec![chat.to_string()];
        for term in terms {
            values.push(format!("%{}%", escape_like(term)));
            let idx = values.len();
            sql.push_str(&format!(
                " AND (m.text LIKE ?{idx} ESCAPE '\\' OR m.display_text LIKE ?{idx} ESCAPE '\\')"
            ));
        }
        sql.push_str(&format!(" ORDER BY m.ts DESC, m.id DESC LIMIT {limit}"));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

/// Quote every term as an FTS5 prefix string (`"` doubled) and join with
/// spaces, which FTS5 treats as AND.
fn fts_match_expr(terms: &[&str]) -> String {
    terms
        .iter()
        .map(|t| format!("\"{}\"*", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::database::test_db;
    use crate::models::UpsertMessageParams;

    fn seed(db: &Database) {
        for (id, chat, text) in [
            ("m1", "123@s.whatsapp.net", "Hello world!"),
            ("m2", "123@s.whatsapp.net", "Goodbye!"),
            ("m3", "456@g.us", "world peace \"now\""),
        ] {
            db.upsert_message(&UpsertMessageParams {
                chat_jid: chat.into(),
                msg_id: id.into(),
                timestamp: Utc::now(),
                text: text.into(),
                ..Default::default()
            })
            .unwrap();
        }
    }

    fn search(db: &Database, query: &str, chat: Option<&str>) -> Vec<String> {
        db.search_messages(&SearchMessagesParams {
            query: query.into(),
            chat_jid: chat.map(str::to_string),
            limit: 50,
        })
        .unwrap()
        .into_iter()
        .map(|m| m.msg_id)
        .collect()
    }

    #[test]
    fn fts_matches_terms_case_insensitively() {
        let (_dir, db) = test_db();
        seed(&db);

        assert_eq!(search(&db, "goodbye", None), ["m2"]);
        assert_eq!(search(&db, "world", Some("123@s.whatsapp.net")), ["m1"]);
        assert_eq!(search(&db, "world", None).len(), 2);
        assert_eq!(search(&db, "world peace", None), ["m3"]);
    }

    #[test]
    fn fts_syntax_in_query_is_literal() {
        let (_dir, db) = test_db();
        seed(&db);

        assert_eq!(search(&db, "\"now\"", None), ["m3"]);
        assert!(search(&db, "world AND OR NEAR(", None).is_empty());
        assert!(search(&db, "   ", None).is_empty());
    }

    #[test]
    fn updated_text_is_reindexed() {
        let (_dir, db) = test_db();
        seed(&db);

        db.upsert_message(&UpsertMessageParams {
            chat_jid: "123@s.whatsapp.net".into(),
            msg_id: "m2".into(),
            timestamp: Utc::now(),
            text: "See you".into(),
            ..Default::default()
        })
        .unwrap();

        assert!(search(&db, "goodbye", None).is_empty());
        assert_eq!(search(&db, "see", None), ["m2"]);
    }

    #[test]
    fn like_fallback_matches_every_term() {
        let (_dir, db) = test_db();
        seed(&db);

        let hits = |q: &str, chat: &str| {
            let terms: Vec<&str> = q.split_whitespace().collect();
            db.search_like(&terms, chat, 50)
                .unwrap()
                .into_iter()
                .map(|m| m.msg_id)
                .collect::<Vec<_>>()
        };

        assert_eq!(hits("GOODBYE", ""), ["m2"]);
        assert_eq!(hits("world peace", ""), ["m3"]);
        assert_eq!(hits("world", "123@s.whatsapp.net"), ["m1"]);
        assert!(hits("100%", "").is_empty());
    }

    #[test]
    fn partial_words_match_on_both_paths() {
        let (_dir, db) = test_db();
        seed(&db);

        assert_eq!(search(&db, "goodb", None), ["m2"]);
        assert_eq!(search(&db, "wor pea", None), ["m3"]);
        assert!(search(&db, "!!", None).is_empty());

        let like: Vec<String> = db
            .search_like(&["goodb"], "", 50)
            .unwrap()
            .into_iter()
            .map(|m| m.msg_id)
            .collect();
        assert_eq!(like, ["m2"]);
    }

    #[test]
    fn match_expr_quotes_terms() {
        assert_eq!(fts_match_expr(&["a\"b", "c"]), "\"a\"\"b\"* \"c\"*");
    }
}
