//! Chat message sync and reconciliation engine.
//!
//! [`MessengerRepository`] runs one-shot reconciliation passes, merging the
//! server's message list with locally sent messages the server has not
//! confirmed yet. [`ChatPoller`] repeats delta passes on a timer and on push
//! notifications.

pub mod chat;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod http;
pub mod locks;
pub mod polling;
pub mod push;
pub mod remote;
pub mod repository;
pub mod sent;

#[cfg(test)]
mod testing;

pub use chat::Chat;
pub use checkpoint::{ActionClock, CheckpointProvider};
pub use config::SyncConfig;
pub use error::{FetchError, Result, SyncError};
pub use http::HttpChatClient;
pub use locks::{ConversationGuard, ConversationLocks};
pub use polling::{ChatPoller, PollState, PollSubscription};
pub use push::PushEvent;
pub use remote::{ChatFetcher, MessageDispatcher, OutgoingMessage, SendMeta};
pub use repository::MessengerRepository;
pub use sent::{Reconciled, SentMessageCache};
