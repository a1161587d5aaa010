//! v002 -- Full-text index over message text.
//!
//! External-content FTS5 table kept in sync with `messages` by triggers.

use rusqlite::Connection;

pub const FTS_TABLE: &str = "messages_fts";

const UP_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    text,
    display_text,
    content = 'messages',
    content_rowid = 'id',
    tokenize = 'unicode61'
);

CREATE TRIGGER IF NOT EXISTS messages_fts_ai AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, text, display_text)
    VALUES (new.id, new.text, new.display_text);
END;

CREATE TRIGGER IF NOT EXISTS messages_fts_ad AFTER DELETE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, text, display_text)
    VALUES ('delete', old.id, old.text, old.display_text);
END;

CREATE TRIGGER IF NOT EXISTS messages_fts_au AFTER UPDATE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, text, display_text)
    VALUES ('delete', old.id, old.text, old.display_text);
    INSERT INTO messages_fts(rowid, text, display_text)
    VALUES (new.id, new.text, new.display_text);
END;

INSERT INTO messages_fts(messages_fts) VALUES ('rebuild');
"#;

/// Apply the FTS migration inside a transaction so a failure leaves no
/// half-created triggers behind.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&format!("BEGIN;\n{UP_SQL}\nCOMMIT;"))
        .map_err(|e| {
            let _ = conn.execute_batch("ROLLBACK;");
            e
        })
}
