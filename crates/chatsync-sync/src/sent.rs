//! Registry of outgoing messages the server has not confirmed yet.
//!
//! Sends register here immediately; each reconciliation pass drops the entries
//! whose client id shows up in the server's list and hands back the rest so
//! they can be displayed next to the server history without duplicates.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use chatsync_store::Message;

type Buckets = HashMap<String, HashMap<String, Message>>;

/// `chat_id -> client_id -> message`. Keying by client id gives set
/// semantics, so registering the same message twice is a no-op.
#[derive(Debug, Default)]
pub struct SentMessageCache {
    buckets: Mutex<Buckets>,
}

/// Outcome of matching the registry against one server listing.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reconciled {
    /// Client ids the server listed in this pass.
    pub confirmed: Vec<String>,
    /// Messages still waiting for the server, oldest first.
    pub unconfirmed: Vec<Message>,
}

fn sorted_by_send_time(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.client_id.cmp(&b.client_id))
    });
    messages
}

impl SentMessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn buckets(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a sent message. Returns `false` if it was already tracked.
    pub fn record(&self, message: Message) -> bool {
        let mut buckets = self.buckets();
        let bucket = buckets.entry(message.chat_id.clone()).or_default();
        if bucket.contains_key(&message.client_id) {
            return false;
        }
        bucket.insert(message.client_id.clone(), message);
        true
    }

    /// Re-register messages read back from the sent mirror store.
    /// Returns how many were not tracked already.
    pub fn restore(&self, messages: impl IntoIterator<Item = Message>) -> usize {
        messages
            .into_iter()
            .filter(|m| !m.client_id.is_empty())
            .map(|m| self.record(m))
            .filter(|added| *added)
            .count()
    }

    /// Drop every tracked message of `chat_id` the server lists in
    /// `server_messages`.
    pub fn reconcile(&self, chat_id: &str, server_messages: &[Message]) -> Reconciled {
        let mut buckets = self.buckets();
        let Some(bucket) = buckets.get_mut(chat_id) else {
            return Reconciled::default();
        };

        let mut confirmed = Vec::new();
        bucket.retain(|client_id, sent| {
            let echoed = server_messages.iter().any(|m| m.same_client_message(sent));
            if echoed {
                confirmed.push(client_id.clone());
            }
            !echoed
        });
        if !confirmed.is_empty() {
            debug!(chat_id, confirmed = confirmed.len(), remaining = bucket.len(), "sent messages confirmed");
        }

        let unconfirmed = bucket.values().cloned().collect();
        if bucket.is_empty() {
            buckets.remove(chat_id);
        }
        Reconciled {
            confirmed,
            unconfirmed: sorted_by_send_time(unconfirmed),
        }
    }

    /// Snapshot of the unconfirmed messages of `chat_id`, oldest first.
    pub fn unconfirmed(&self, chat_id: &str) -> Vec<Message> {
        let buckets = self.buckets();
        let messages = buckets
            .get(chat_id)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default();
        sorted_by_send_time(messages)
    }

    pub fn contains(&self, chat_id: &str, client_id: &str) -> bool {
        self.buckets()
            .get(chat_id)
            .is_some_and(|bucket| bucket.contains_key(client_id))
    }

    pub fn clear(&self, chat_id: &str) {
        self.buckets().remove(chat_id);
    }

    pub fn clear_all(&self) {
        self.buckets().clear();
    }

    /// Total number of tracked messages across conversations.
    pub fn len(&self) -> usize {
        self.buckets().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;

    fn sent(chat: &str, text: &str, offset_ms: i64) -> Message {
        let mut m = Message::outgoing(chat, text);
        m.timestamp += Duration::milliseconds(offset_ms);
        m
    }

    fn server_echo(of: &Message) -> Message {
        Message {
            id: format!("srv-{}", of.text),
            peer_id: of.peer_id.clone(),
            ..of.clone()
        }
    }

    #[test]
    fn record_is_idempotent() {
        let cache = SentMessageCache::new();
        let m = sent("peer1", "hi", 0);
        assert!(cache.record(m.clone()));
        assert!(!cache.record(m));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn restore_twice_yields_no_duplicates() {
        let cache = SentMessageCache::new();
        let rows = vec![sent("peer1", "a", 0), sent("peer1", "b", 1), sent("peer2", "c", 2)];

        assert_eq!(cache.restore(rows.clone()), 3);
        assert_eq!(cache.restore(rows), 0);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.unconfirmed("peer1").len(), 2);
    }

    #[test]
    fn reconcile_removes_echoed_and_sorts_rest() {
        let cache = SentMessageCache::new();
        let late = sent("peer1", "late", 50);
        let early = sent("peer1", "early", 0);
        let echoed = sent("peer1", "echoed", 10);
        for m in [&late, &early, &echoed] {
            cache.record(m.clone());
        }

        let rest = cache.reconcile("peer1", &[server_echo(&echoed)]);
        assert_eq!(rest.confirmed, vec![echoed.client_id.clone()]);
        let texts: Vec<_> = rest.unconfirmed.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["early", "late"]);
        assert!(!cache.contains("peer1", &echoed.client_id));

        // A later pass that no longer lists the echo must not resurrect it.
        let rest = cache.reconcile("peer1", &[]);
        assert!(rest.confirmed.is_empty());
        assert_eq!(rest.unconfirmed.len(), 2);
    }

    #[test]
    fn reconcile_ignores_peer_messages_without_client_id() {
        let cache = SentMessageCache::new();
        let mine = sent("peer1", "mine", 0);
        cache.record(mine.clone());

        let mut peer = server_echo(&mine);
        peer.client_id.clear();
        peer.peer_id = "peer1".into();

        let rest = cache.reconcile("peer1", &[peer]);
        assert!(rest.confirmed.is_empty());
        assert_eq!(rest.unconfirmed.len(), 1);
    }

    #[test]
    fn reconcile_is_scoped_to_chat() {
        let cache = SentMessageCache::new();
        let a = sent("a", "x", 0);
        cache.record(a.clone());

        assert_eq!(cache.reconcile("b", &[server_echo(&a)]), Reconciled::default());
        assert!(cache.contains("a", &a.client_id));
    }

    #[test]
    fn clear_and_clear_all() {
        let cache = SentMessageCache::new();
        cache.record(sent("a", "1", 0));
        cache.record(sent("b", "2", 0));

        cache.clear("a");
        assert!(cache.unconfirmed("a").is_empty());
        assert_eq!(cache.len(), 1);

        cache.clear_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_record_and_reconcile() {
        let cache = Arc::new(SentMessageCache::new());
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.record(sent("peer1", &format!("{t}-{i}"), i));
                    }
                })
            })
            .collect();
        let reader = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let _ = cache.reconcile("peer1", &[]);
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(cache.unconfirmed("peer1").len(), 400);
    }
}
