//! Continuous delta polling of a conversation.
//!
//! Each subscription owns a background task running an explicit loop:
//!
//! - success: deliver the chat, wait the current poll interval
//! - busy: wait `skip_retry_delay` and try again, no cycle counted
//! - transient failure: log it, wait the poll interval
//! - hard failure: deliver the error and stop
//!
//! Cancellation is cooperative. A fetch already in flight completes but its
//! result is dropped.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, trace, warn};

use chatsync_shared::ImageResolution;

use crate::chat::Chat;
use crate::error::Result;
use crate::push::{refresh_on_push, PushEvent};
use crate::repository::MessengerRepository;

const DELIVERY_BUFFER: usize = 16;
const PUSH_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
}

#[derive(Debug)]
struct Progress {
    polling: AtomicBool,
    cycles: AtomicU64,
}

/// Starts poll subscriptions and fans push notifications out to them.
pub struct ChatPoller {
    repo: Arc<MessengerRepository>,
    push_tx: broadcast::Sender<PushEvent>,
}

impl ChatPoller {
    pub fn new(repo: Arc<MessengerRepository>) -> Self {
        let (push_tx, _) = broadcast::channel(PUSH_BUFFER);
        Self { repo, push_tx }
    }

    pub fn repository(&self) -> &Arc<MessengerRepository> {
        &self.repo
    }

    /// Signal that the server has news for `peer_id`. Returns the number of
    /// subscriptions that received the event.
    pub fn notify_push(&self, peer_id: &str) -> usize {
        self.push_tx
            .send(PushEvent {
                peer_id: peer_id.to_string(),
            })
            .unwrap_or(0)
    }

    /// Start polling `chat_id`. Must be called within a Tokio runtime.
    pub fn subscribe(&self, chat_id: &str, resolution: ImageResolution) -> PollSubscription {
        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let progress = Arc::new(Progress {
            polling: AtomicBool::new(true),
            cycles: AtomicU64::new(0),
        });

        tokio::spawn(refresh_on_push(
            Arc::clone(&self.repo),
            chat_id.to_string(),
            resolution,
            self.push_tx.subscribe(),
            tx.downgrade(),
            cancel_rx.clone(),
        ));
        tokio::spawn(poll_loop(
            Arc::clone(&self.repo),
            chat_id.to_string(),
            resolution,
            tx,
            cancel_rx,
            Arc::clone(&progress),
        ));

        info!(chat_id, "Polling started");
        PollSubscription {
            chat_id: chat_id.to_string(),
            rx,
            cancel: cancel_tx,
            progress,
        }
    }
}

/// Stream of reconciled chats for one conversation. Dropping it cancels
/// the polling.
pub struct PollSubscription {
    chat_id: String,
    rx: mpsc::Receiver<Result<Chat>>,
    cancel: watch::Sender<bool>,
    progress: Arc<Progress>,
}

impl PollSubscription {
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn state(&self) -> PollState {
        if self.progress.polling.load(Ordering::SeqCst) {
            PollState::Polling
        } else {
            PollState::Idle
        }
    }

    /// Poll cycles that delivered a chat.
    pub fn completed_cycles(&self) -> u64 {
        self.progress.cycles.load(Ordering::SeqCst)
    }
}

impl Stream for PollSubscription {
    type Item = Result<Chat>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

fn cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || cancel.has_changed().is_err()
}

/// Sleep for `delay`. Returns `false` if cancelled meanwhile.
async fn wait(delay: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => !cancelled(cancel),
        _ = cancel.changed() => false,
    }
}

async fn poll_loop(
    repo: Arc<MessengerRepository>,
    chat_id: String,
    resolution: ImageResolution,
    tx: mpsc::Sender<Result<Chat>>,
    mut cancel: watch::Receiver<bool>,
    progress: Arc<Progress>,
) {
    let config = repo.config().clone();

    let mut proceed = wait(config.initial_poll_delay, &mut cancel).await;
    while proceed {
        let result = repo.get_chat_delta(&chat_id, resolution).await;
        if cancelled(&cancel) {
            debug!(chat_id = %chat_id, "Discarding result of cancelled poll");
            break;
        }

        let delay = match result {
            Ok(chat) => {
                progress.cycles.fetch_add(1, Ordering::SeqCst);
                if tx.send(Ok(chat)).await.is_err() {
                    break;
                }
                repo.poll_interval()
            }
            Err(e) if e.is_skip() => {
                trace!(chat_id = %chat_id, "Poll skipped, conversation busy");
                config.skip_retry_delay
            }
            Err(e) if e.is_retryable() => {
                warn!(chat_id = %chat_id, error = %e, "Poll failed, retrying next tick");
                repo.poll_interval()
            }
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Poll failed, stopping");
                let _ = tx.send(Err(e)).await;
                break;
            }
        };

        proceed = wait(delay, &mut cancel).await;
    }

    progress.polling.store(false, Ordering::SeqCst);
    info!(
        chat_id = %chat_id,
        cycles = progress.cycles.load(Ordering::SeqCst),
        "Polling stopped"
    );
}
