//! In-process fakes for engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::{mpsc, Notify};

use chatsync_shared::constants::CURRENT_USER_ID;
use chatsync_shared::ImageResolution;
use chatsync_store::{Database, Message, MessageStore, SharedDatabase, SqliteMessageStore};
use chatsync_store::Result as StoreResult;

use crate::chat::Chat;
use crate::checkpoint::ActionClock;
use crate::config::SyncConfig;
use crate::error::FetchError;
use crate::remote::{ChatFetcher, MessageDispatcher, OutgoingMessage};
use crate::repository::MessengerRepository;

/// Hands out queued responses in order, one per call.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<Chat, FetchError>>>,
    calls: AtomicUsize,
    hold: Mutex<Option<Gate>>,
}

impl ScriptedFetcher {
    pub fn push(&self, response: Result<Chat, FetchError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next call signal `entered` and wait for `release`.
    pub fn hold_next(&self) -> (Arc<Notify>, Arc<Notify>) {
        new_gate(&self.hold)
    }
}

#[async_trait]
impl ChatFetcher for ScriptedFetcher {
    async fn fetch_chat(
        &self,
        _chat_id: &str,
        _resolution: ImageResolution,
        _checkpoint: i64,
    ) -> Result<Chat, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.hold).await;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Network("script exhausted".into())))
    }
}

/// Forwards every dispatched message to a channel.
pub struct RecordingDispatcher {
    tx: mpsc::UnboundedSender<OutgoingMessage>,
}

#[async_trait]
impl MessageDispatcher for RecordingDispatcher {
    async fn dispatch(&self, outgoing: &OutgoingMessage) -> Result<(), FetchError> {
        let _ = self.tx.send(outgoing.clone());
        Ok(())
    }
}

/// Entered/release pair pausing one call until the test lets it go.
type Gate = (Arc<Notify>, Arc<Notify>);

fn new_gate(slot: &Mutex<Option<Gate>>) -> Gate {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    *slot.lock().unwrap() = Some((Arc::clone(&entered), Arc::clone(&release)));
    (entered, release)
}

async fn pass_gate(slot: &Mutex<Option<Gate>>) {
    let gate = slot.lock().unwrap().take();
    if let Some((entered, release)) = gate {
        entered.notify_one();
        release.notified().await;
    }
}

/// SQLite store whose next `delete_by_client_ids` can be held open.
pub struct HeldStore {
    inner: Arc<SqliteMessageStore>,
    hold: Mutex<Option<Gate>>,
}

impl HeldStore {
    pub fn hold_next_delete(&self) -> (Arc<Notify>, Arc<Notify>) {
        new_gate(&self.hold)
    }
}

#[async_trait]
impl MessageStore for HeldStore {
    async fn insert(&self, messages: &[Message], read: bool) -> StoreResult<()> {
        self.inner.insert(messages, read).await
    }

    async fn delete_by_client_ids(&self, chat_id: &str, client_ids: &[String]) -> StoreResult<()> {
        pass_gate(&self.hold).await;
        self.inner.delete_by_client_ids(chat_id, client_ids).await
    }

    async fn messages(&self, chat_id: &str) -> StoreResult<Vec<Message>> {
        self.inner.messages(chat_id).await
    }

    async fn all_messages(&self) -> StoreResult<Vec<Message>> {
        self.inner.all_messages().await
    }

    async fn count(&self, chat_id: &str) -> StoreResult<usize> {
        self.inner.count(chat_id).await
    }

    async fn unread_count(&self, chat_id: &str) -> StoreResult<usize> {
        self.inner.unread_count(chat_id).await
    }

    async fn mark_read(&self, chat_id: &str) -> StoreResult<()> {
        self.inner.mark_read(chat_id).await
    }

    async fn delete_for_chat(&self, chat_id: &str) -> StoreResult<()> {
        self.inner.delete_for_chat(chat_id).await
    }

    async fn delete_all(&self) -> StoreResult<()> {
        self.inner.delete_all().await
    }
}

pub struct Harness {
    pub repo: Arc<MessengerRepository>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub received: Arc<SqliteMessageStore>,
    pub sent: Arc<SqliteMessageStore>,
    pub dispatched: mpsc::UnboundedReceiver<OutgoingMessage>,
}

pub fn harness(config: SyncConfig) -> Harness {
    let db = Database::open_in_memory().unwrap().into_shared();
    harness_over(db, config)
}

/// Engine over an existing database, e.g. a file reopened after a restart.
pub fn harness_over(db: SharedDatabase, config: SyncConfig) -> Harness {
    build(db, config, |sent| sent as Arc<dyn MessageStore>)
}

/// Engine whose sent mirror deletes can be paused mid-pass.
pub fn harness_with_held_mirror(config: SyncConfig) -> (Harness, Arc<HeldStore>) {
    let db = Database::open_in_memory().unwrap().into_shared();
    let mut held = None;
    let h = build(db, config, |sent| {
        let store = Arc::new(HeldStore {
            inner: sent,
            hold: Mutex::new(None),
        });
        held = Some(Arc::clone(&store));
        store as Arc<dyn MessageStore>
    });
    (h, held.unwrap())
}

fn build(
    db: SharedDatabase,
    config: SyncConfig,
    wrap_sent: impl FnOnce(Arc<SqliteMessageStore>) -> Arc<dyn MessageStore>,
) -> Harness {
    let (received, sent) = SqliteMessageStore::pair(db);
    let (received, sent) = (Arc::new(received), Arc::new(sent));
    let fetcher = Arc::new(ScriptedFetcher::default());
    let (tx, dispatched) = mpsc::unbounded_channel();

    let repo = MessengerRepository::new(
        Arc::clone(&fetcher) as Arc<dyn ChatFetcher>,
        Arc::new(RecordingDispatcher { tx }),
        Arc::clone(&received) as Arc<dyn MessageStore>,
        wrap_sent(Arc::clone(&sent)),
        Arc::new(ActionClock::new()),
        config,
    );

    Harness {
        repo: Arc::new(repo),
        fetcher,
        received,
        sent,
        dispatched,
    }
}

pub fn peer_message(chat_id: &str, id: &str, at_ms: i64) -> Message {
    Message {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        peer_id: chat_id.to_string(),
        client_id: String::new(),
        text: format!("text of {id}"),
        timestamp: Utc.timestamp_millis_opt(at_ms).unwrap(),
    }
}

/// The server's copy of a message the user sent.
pub fn server_echo(of: &Message, id: &str) -> Message {
    Message {
        id: id.to_string(),
        peer_id: CURRENT_USER_ID.to_string(),
        ..of.clone()
    }
}

pub fn chat_of(chat_id: &str, messages: Vec<Message>) -> Chat {
    Chat::new(chat_id, messages)
}

/// `n` peer messages with ids `m0..m{n-1}`.
pub fn history(chat_id: &str, n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| peer_message(chat_id, &format!("m{i}"), 1_000 + i as i64))
        .collect()
}
