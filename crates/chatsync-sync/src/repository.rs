//! The reconciliation pipeline.
//!
//! [`MessengerRepository`] merges the server's view of a conversation with
//! the messages the user sent locally. Every pass runs under the
//! conversation's lock:
//!
//! 1. acquire the lock, or fail with [`SyncError::Busy`]
//! 2. fetch the chat with the current checkpoint, adopt the suggested poll
//!    interval
//! 3. in delta mode, keep only the messages beyond what is already stored
//! 4. drop confirmed sent messages and attach the unconfirmed ones
//! 5. drop confirmed rows from the sent mirror, persist the received messages
//!
//! The lock guard lives for the whole pass and is released on every exit.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use chatsync_shared::ImageResolution;
use chatsync_store::{Message, MessageStore};

use crate::chat::Chat;
use crate::checkpoint::CheckpointProvider;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::locks::ConversationLocks;
use crate::remote::{ChatFetcher, MessageDispatcher, OutgoingMessage, SendMeta};
use crate::sent::{Reconciled, SentMessageCache};

/// Keep the messages beyond the `stored` ones already in the local store.
///
/// Relies on the server list being append-only: position `stored` onwards
/// is new, everything before it was seen.
pub fn filter_new_messages(mut chat: Chat, stored: usize) -> Chat {
    let new = if chat.messages.len() > stored {
        chat.messages.split_off(stored)
    } else {
        Vec::new()
    };
    chat.with_messages(new)
}

/// Received messages followed by sent ones, at most one record per client
/// id, newest first.
fn merge_history(received: Vec<Message>, sent: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Message> = received
        .into_iter()
        .chain(sent)
        .filter(|m| m.client_id.is_empty() || seen.insert(m.client_id.clone()))
        .collect();
    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    merged.reverse();
    merged
}

pub struct MessengerRepository {
    fetcher: Arc<dyn ChatFetcher>,
    dispatcher: Arc<dyn MessageDispatcher>,
    received: Arc<dyn MessageStore>,
    sent_store: Arc<dyn MessageStore>,
    checkpoint: Arc<dyn CheckpointProvider>,
    locks: ConversationLocks,
    sent: SentMessageCache,
    poll_interval_ms: AtomicU64,
    config: SyncConfig,
}

impl MessengerRepository {
    pub fn new(
        fetcher: Arc<dyn ChatFetcher>,
        dispatcher: Arc<dyn MessageDispatcher>,
        received: Arc<dyn MessageStore>,
        sent_store: Arc<dyn MessageStore>,
        checkpoint: Arc<dyn CheckpointProvider>,
        config: SyncConfig,
    ) -> Self {
        Self {
            fetcher,
            dispatcher,
            received,
            sent_store,
            checkpoint,
            locks: ConversationLocks::new(),
            sent: SentMessageCache::new(),
            poll_interval_ms: AtomicU64::new(config.base_poll_interval().as_millis() as u64),
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn locks(&self) -> &ConversationLocks {
        &self.locks
    }

    pub fn sent_cache(&self) -> &SentMessageCache {
        &self.sent
    }

    /// Interval the poller currently waits between cycles.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.load(Ordering::SeqCst))
    }

    fn adopt_poll_interval(&self, hint: Option<Duration>) {
        match hint {
            Some(d) if d >= self.config.min_poll_interval => {
                let ms = d.as_millis() as u64;
                if self.poll_interval_ms.swap(ms, Ordering::SeqCst) != ms {
                    debug!(interval_ms = ms, "Poll interval updated");
                }
            }
            Some(d) => debug!(hint_ms = d.as_millis() as u64, "Ignoring too short poll hint"),
            None => {}
        }
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Fetch the whole conversation and reconcile it.
    pub async fn get_chat(&self, chat_id: &str, resolution: ImageResolution) -> Result<Chat> {
        self.reconcile(chat_id, resolution, false).await
    }

    /// Fetch the conversation and reconcile only the messages not stored yet.
    pub async fn get_chat_delta(&self, chat_id: &str, resolution: ImageResolution) -> Result<Chat> {
        self.reconcile(chat_id, resolution, true).await
    }

    /// [`Self::get_chat_delta`], waiting out a busy conversation.
    pub async fn get_chat_delta_retrying(
        &self,
        chat_id: &str,
        resolution: ImageResolution,
    ) -> Result<Chat> {
        self.retry_on_busy(|| self.get_chat_delta(chat_id, resolution))
            .await
    }

    async fn reconcile(&self, chat_id: &str, resolution: ImageResolution, delta: bool) -> Result<Chat> {
        let _guard = self.locks.try_acquire(chat_id).ok_or_else(|| {
            debug!(chat_id, "Conversation busy, skipping this try");
            SyncError::Busy(chat_id.to_string())
        })?;

        let chat = self
            .fetcher
            .fetch_chat(chat_id, resolution, self.checkpoint.checkpoint())
            .await?;
        self.adopt_poll_interval(chat.pull_again_after);

        let mut chat = if delta {
            let stored = self.received.count(chat_id).await?;
            let fetched = chat.messages.len();
            let chat = filter_new_messages(chat, stored);
            debug!(chat_id, fetched, stored, new = chat.messages.len(), "Delta filtered");
            chat
        } else {
            chat
        };

        // Sends may land while this pass runs. Only touch mirror rows the
        // registry snapshot accounted for.
        let Reconciled {
            confirmed,
            unconfirmed,
        } = self.sent.reconcile(chat_id, &chat.messages);
        self.sent_store
            .delete_by_client_ids(chat_id, &confirmed)
            .await?;
        self.sent_store.insert(&unconfirmed, true).await?;
        self.received.insert(&chat.messages, true).await?;

        debug!(
            chat_id,
            peer = chat.count_peer_messages(),
            mine = chat.count_user_messages(),
            unconfirmed = unconfirmed.len(),
            "Chat reconciled"
        );
        chat.unconsumed_sent_local_messages = unconfirmed;
        Ok(chat)
    }

    async fn retry_on_busy<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        loop {
            match op().await {
                Err(e) if e.is_skip() && attempts < self.config.busy_retry_limit => {
                    attempts += 1;
                    tokio::time::sleep(self.config.skip_retry_delay).await;
                }
                other => return other,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Echo a message locally and upload it in the background.
    ///
    /// The returned message is tracked as unconfirmed until a fetch lists
    /// its client id.
    pub async fn send_message(&self, chat_id: &str, text: &str, meta: SendMeta) -> Result<Message> {
        if text.trim().is_empty() {
            return Err(SyncError::EmptyMessage);
        }

        let message = Message::outgoing(chat_id, text);
        self.sent.record(message.clone());
        self.checkpoint.record_action(message.timestamp);

        if let Err(e) = self
            .sent_store
            .insert(std::slice::from_ref(&message), true)
            .await
        {
            warn!(chat_id, client_id = %message.client_id, error = %e, "Failed to mirror sent message");
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let outgoing = OutgoingMessage {
            message: message.clone(),
            meta,
        };
        tokio::spawn(async move {
            match dispatcher.dispatch(&outgoing).await {
                Ok(()) => debug!(client_id = %outgoing.message.client_id, "Message uploaded"),
                Err(e) => warn!(
                    client_id = %outgoing.message.client_id,
                    error = %e,
                    "Message upload failed"
                ),
            }
        });

        debug!(chat_id, client_id = %message.client_id, "Message sent");
        Ok(message)
    }

    /// Stored history plus unconfirmed sent messages, newest first.
    /// Marks the received messages as read.
    pub async fn get_cached_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        self.retry_on_busy(|| self.cached_messages_once(chat_id))
            .await
    }

    async fn cached_messages_once(&self, chat_id: &str) -> Result<Vec<Message>> {
        let _guard = self
            .locks
            .try_acquire(chat_id)
            .ok_or_else(|| SyncError::Busy(chat_id.to_string()))?;

        self.received.mark_read(chat_id).await?;
        let received = self.received.messages(chat_id).await?;
        let mut sent = self.sent_store.messages(chat_id).await?;
        sent.extend(self.sent.unconfirmed(chat_id));

        Ok(merge_history(received, sent))
    }

    // -----------------------------------------------------------------------
    // Housekeeping
    // -----------------------------------------------------------------------

    /// Re-register the sent mirror after a restart. Returns how many messages
    /// were not tracked yet.
    pub async fn restore_sent_messages(&self) -> Result<usize> {
        let rows = self.sent_store.all_messages().await?;
        let restored = self.sent.restore(rows);
        info!(restored, tracked = self.sent.len(), "Unconfirmed sent messages restored");
        Ok(restored)
    }

    pub async fn clear_conversation(&self, chat_id: &str) -> Result<()> {
        self.received.delete_for_chat(chat_id).await?;
        self.clear_sent(chat_id).await?;
        info!(chat_id, "Conversation cleared");
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.received.delete_all().await?;
        self.clear_all_sent().await?;
        info!("All conversations cleared");
        Ok(())
    }

    /// Forget the unconfirmed messages of one conversation.
    pub async fn clear_sent(&self, chat_id: &str) -> Result<()> {
        self.sent.clear(chat_id);
        self.sent_store.delete_for_chat(chat_id).await?;
        Ok(())
    }

    pub async fn clear_all_sent(&self) -> Result<()> {
        self.sent.clear_all();
        self.sent_store.delete_all().await?;
        Ok(())
    }
}
