//! Async message store contract and its SQLite implementation.
//!
//! The sync engine talks to two stores, one per [`MessageTable`]. They are
//! queried and cleared independently so confirmed sent messages can be
//! purged without touching received history.

use std::sync::Arc;

use async_trait::async_trait;

use crate::database::{Database, SharedDatabase};
use crate::error::{Result, StoreError};
use crate::models::{Message, MessageTable};

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert (or replace by id) a batch of messages.
    async fn insert(&self, messages: &[Message], read: bool) -> Result<()>;

    /// Delete the rows of `chat_id` whose client id is in `client_ids`.
    async fn delete_by_client_ids(&self, chat_id: &str, client_ids: &[String]) -> Result<()>;

    /// Messages of one conversation, oldest first.
    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>>;

    /// Every stored message.
    async fn all_messages(&self) -> Result<Vec<Message>>;

    async fn count(&self, chat_id: &str) -> Result<usize>;

    async fn unread_count(&self, chat_id: &str) -> Result<usize>;

    async fn mark_read(&self, chat_id: &str) -> Result<()>;

    async fn delete_for_chat(&self, chat_id: &str) -> Result<()>;

    async fn delete_all(&self) -> Result<()>;
}

/// [`MessageStore`] over one table of a shared SQLite [`Database`].
///
/// Queries run on the blocking thread pool so callers never stall the async
/// runtime.
#[derive(Clone)]
pub struct SqliteMessageStore {
    db: SharedDatabase,
    table: MessageTable,
}

impl SqliteMessageStore {
    pub fn new(db: SharedDatabase, table: MessageTable) -> Self {
        Self { db, table }
    }

    /// Build the received and sent stores over the same database.
    pub fn pair(db: SharedDatabase) -> (Self, Self) {
        (
            Self::new(Arc::clone(&db), MessageTable::Received),
            Self::new(db, MessageTable::Sent),
        )
    }

    pub fn table(&self) -> MessageTable {
        self.table
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database, MessageTable) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let table = self.table;
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut *guard, table)
        })
        .await?
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn insert(&self, messages: &[Message], read: bool) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let messages = messages.to_vec();
        let inserted = self
            .with_db(move |db, table| db.insert_messages(table, &messages, read))
            .await?;
        tracing::trace!(table = %self.table, count = inserted, "messages inserted");
        Ok(())
    }

    async fn delete_by_client_ids(&self, chat_id: &str, client_ids: &[String]) -> Result<()> {
        if client_ids.is_empty() {
            return Ok(());
        }
        let chat_id = chat_id.to_string();
        let client_ids = client_ids.to_vec();
        let deleted = self
            .with_db(move |db, table| db.delete_messages_by_client_id(table, &chat_id, &client_ids))
            .await?;
        tracing::trace!(table = %self.table, count = deleted, "messages deleted by client id");
        Ok(())
    }

    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let chat_id = chat_id.to_string();
        self.with_db(move |db, table| db.get_messages_for_chat(table, &chat_id))
            .await
    }

    async fn all_messages(&self) -> Result<Vec<Message>> {
        self.with_db(|db, table| db.get_all_messages(table)).await
    }

    async fn count(&self, chat_id: &str) -> Result<usize> {
        let chat_id = chat_id.to_string();
        self.with_db(move |db, table| db.count_messages(table, &chat_id))
            .await
    }

    async fn unread_count(&self, chat_id: &str) -> Result<usize> {
        let chat_id = chat_id.to_string();
        self.with_db(move |db, table| db.count_unread_messages(table, &chat_id))
            .await
    }

    async fn mark_read(&self, chat_id: &str) -> Result<()> {
        let chat_id = chat_id.to_string();
        self.with_db(move |db, table| db.mark_messages_as_read(table, &chat_id))
            .await?;
        Ok(())
    }

    async fn delete_for_chat(&self, chat_id: &str) -> Result<()> {
        let chat_id = chat_id.to_string();
        let deleted = self
            .with_db(move |db, table| db.delete_messages_for_chat(table, &chat_id))
            .await?;
        tracing::debug!(table = %self.table, count = deleted, "chat messages deleted");
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let deleted = self.with_db(|db, table| db.delete_all_messages(table)).await?;
        tracing::debug!(table = %self.table, count = deleted, "all messages deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores() -> (SqliteMessageStore, SqliteMessageStore) {
        SqliteMessageStore::pair(Database::open_in_memory().unwrap().into_shared())
    }

    #[tokio::test]
    async fn pair_addresses_separate_tables() {
        let (received, sent) = stores();
        assert_eq!(received.table(), MessageTable::Received);
        assert_eq!(sent.table(), MessageTable::Sent);

        sent.insert(&[Message::outgoing("peer1", "hi")], true)
            .await
            .unwrap();

        assert_eq!(sent.count("peer1").await.unwrap(), 1);
        assert_eq!(received.count("peer1").await.unwrap(), 0);

        received.delete_all().await.unwrap();
        assert_eq!(sent.count("peer1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unread_then_mark_read() {
        let (received, _) = stores();
        let mut m = Message::outgoing("peer1", "from peer");
        m.peer_id = "peer1".into();
        m.client_id.clear();
        received.insert(&[m], false).await.unwrap();

        assert_eq!(received.unread_count("peer1").await.unwrap(), 1);
        received.mark_read("peer1").await.unwrap();
        assert_eq!(received.unread_count("peer1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_by_client_ids_and_for_chat() {
        let (_, sent) = stores();
        let a = Message::outgoing("peer1", "a");
        let b = Message::outgoing("peer1", "b");
        let other = Message::outgoing("peer2", "c");
        sent.insert(&[a.clone(), b.clone(), other], true)
            .await
            .unwrap();

        sent.delete_by_client_ids("peer1", &[a.client_id.clone()])
            .await
            .unwrap();
        let left = sent.messages("peer1").await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].client_id, b.client_id);

        sent.delete_for_chat("peer1").await.unwrap();
        assert_eq!(sent.count("peer1").await.unwrap(), 0);
        assert_eq!(sent.all_messages().await.unwrap().len(), 1);
    }
}
