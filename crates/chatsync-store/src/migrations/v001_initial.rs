//! v001 -- Initial schema creation.
//!
//! Creates the two message tables: `received_messages` (server-confirmed
//! history) and `sent_messages` (local mirror of messages the server has not
//! echoed back yet). Both share one layout so the same queries serve either.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Received messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS received_messages (
    chat_id    TEXT NOT NULL,
    id         TEXT NOT NULL,
    peer_id    TEXT NOT NULL,
    client_id  TEXT NOT NULL DEFAULT '',
    text       TEXT NOT NULL,
    timestamp  TEXT NOT NULL,                 -- RFC-3339, millisecond precision
    is_read    INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1

    PRIMARY KEY (chat_id, id)
);

CREATE INDEX IF NOT EXISTS idx_received_chat_ts
    ON received_messages(chat_id, timestamp);

-- ----------------------------------------------------------------
-- Sent messages awaiting confirmation
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sent_messages (
    chat_id    TEXT NOT NULL,
    id         TEXT NOT NULL,
    peer_id    TEXT NOT NULL,
    client_id  TEXT NOT NULL DEFAULT '',
    text       TEXT NOT NULL,
    timestamp  TEXT NOT NULL,
    is_read    INTEGER NOT NULL DEFAULT 0,

    PRIMARY KEY (chat_id, id)
);

CREATE INDEX IF NOT EXISTS idx_sent_chat_ts
    ON sent_messages(chat_id, timestamp);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
