use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::{Message, MessageTable};

/// Fixed-width timestamps keep lexical order equal to chronological order.
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Database {
    /// Insert or replace `messages` in `table`. Rows are keyed by
    /// `(chat_id, id)`, so inserting the same server message twice keeps a
    /// single row.
    pub fn insert_messages(
        &mut self,
        table: MessageTable,
        messages: &[Message],
        read: bool,
    ) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {table} (chat_id, id, peer_id, client_id, text, timestamp, is_read)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ))?;
            for m in messages {
                stmt.execute(params![
                    m.chat_id,
                    m.id,
                    m.peer_id,
                    m.client_id,
                    m.text,
                    encode_timestamp(&m.timestamp),
                    read,
                ])?;
            }
        }
        tx.commit()?;
        Ok(messages.len())
    }

    /// Delete the rows of `chat_id` carrying one of `client_ids`. Other rows
    /// of the conversation are left alone.
    pub fn delete_messages_by_client_id(
        &mut self,
        table: MessageTable,
        chat_id: &str,
        client_ids: &[String],
    ) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;
        let mut affected = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "DELETE FROM {table} WHERE chat_id = ?1 AND client_id = ?2"
            ))?;
            for client_id in client_ids.iter().filter(|id| !id.is_empty()) {
                affected += stmt.execute(params![chat_id, client_id])?;
            }
        }
        tx.commit()?;
        Ok(affected)
    }

    /// Messages of one conversation, oldest first.
    pub fn get_messages_for_chat(&self, table: MessageTable, chat_id: &str) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT id, chat_id, peer_id, client_id, text, timestamp
             FROM {table}
             WHERE chat_id = ?1
             ORDER BY timestamp ASC, rowid ASC"
        ))?;

        let rows = stmt.query_map(params![chat_id], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Every message in `table`, grouped by conversation, oldest first.
    pub fn get_all_messages(&self, table: MessageTable) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT id, chat_id, peer_id, client_id, text, timestamp
             FROM {table}
             ORDER BY chat_id ASC, timestamp ASC, rowid ASC"
        ))?;

        let rows = stmt.query_map([], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn count_messages(&self, table: MessageTable, chat_id: &str) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE chat_id = ?1"),
            params![chat_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn count_unread_messages(&self, table: MessageTable, chat_id: &str) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE chat_id = ?1 AND is_read = 0"),
            params![chat_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Returns the number of rows flipped to read.
    pub fn mark_messages_as_read(&self, table: MessageTable, chat_id: &str) -> Result<usize> {
        let affected = self.conn().execute(
            &format!("UPDATE {table} SET is_read = 1 WHERE chat_id = ?1 AND is_read = 0"),
            params![chat_id],
        )?;
        Ok(affected)
    }

    pub fn delete_messages_for_chat(&self, table: MessageTable, chat_id: &str) -> Result<usize> {
        let affected = self.conn().execute(
            &format!("DELETE FROM {table} WHERE chat_id = ?1"),
            params![chat_id],
        )?;
        Ok(affected)
    }

    pub fn delete_all_messages(&self, table: MessageTable) -> Result<usize> {
        let affected = self.conn().execute(&format!("DELETE FROM {table}"), [])?;
        Ok(affected)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let ts_str: String = row.get(5)?;

    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        peer_id: row.get(2)?,
        client_id: row.get(3)?,
        text: row.get(4)?,
        timestamp,
    })
}
