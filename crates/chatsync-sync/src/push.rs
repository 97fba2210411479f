//! Push-triggered refresh for one subscription.
//!
//! Push notifications only say "something changed for peer X". Bursts for
//! the subscribed conversation collapse into a single delta reconciliation
//! once they have been quiet for `push_debounce`.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, warn};

use chatsync_shared::ImageResolution;

use crate::chat::Chat;
use crate::error::Result;
use crate::repository::MessengerRepository;

/// A push notification for the conversation with `peer_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub peer_id: String,
}

/// Wait for the next event of `chat_id`. `false` once the channel is closed.
async fn next_matching(events: &mut broadcast::Receiver<PushEvent>, chat_id: &str) -> bool {
    loop {
        match events.recv().await {
            Ok(event) if event.peer_id == chat_id => return true,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                // Dropped events may have been ours.
                debug!(chat_id, skipped, "Push receiver lagged");
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}

fn cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || cancel.has_changed().is_err()
}

/// Refresh loop of one subscription. Ends on cancellation, when the push
/// channel closes, or once the subscription's poll loop has stopped.
pub(crate) async fn refresh_on_push(
    repo: Arc<MessengerRepository>,
    chat_id: String,
    resolution: ImageResolution,
    mut events: broadcast::Receiver<PushEvent>,
    tx: mpsc::WeakSender<Result<Chat>>,
    mut cancel: watch::Receiver<bool>,
) {
    let debounce = repo.config().push_debounce;

    'outer: loop {
        let got = tokio::select! {
            got = next_matching(&mut events, &chat_id) => got,
            _ = cancel.changed() => false,
        };
        if !got {
            break;
        }

        // Trailing debounce: every new event restarts the quiet period.
        loop {
            tokio::select! {
                got = next_matching(&mut events, &chat_id) => {
                    if !got {
                        break 'outer;
                    }
                }
                _ = tokio::time::sleep(debounce) => break,
                _ = cancel.changed() => break 'outer,
            }
        }

        let Some(tx) = tx.upgrade() else {
            break;
        };
        debug!(chat_id = %chat_id, "Push refresh");
        match repo.get_chat_delta_retrying(&chat_id, resolution).await {
            Ok(chat) => {
                if cancelled(&cancel) || tx.send(Ok(chat)).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(chat_id = %chat_id, error = %e, "Push refresh failed"),
        }
    }

    debug!(chat_id = %chat_id, "Push refresh stopped");
}
