use std::time::Duration;

use serde::Serialize;

use chatsync_shared::{Gender, OnlineStatus};
use chatsync_store::Message;

/// Snapshot of one conversation as produced by a reconciliation pass.
///
/// Never persisted as a whole; only its messages are.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Chat {
    /// Peer id, which doubles as the conversation id.
    pub id: String,
    /// Server messages, oldest first. In delta mode only the new ones.
    pub messages: Vec<Message>,
    /// Locally sent messages the server has not listed yet, oldest first.
    pub unconsumed_sent_local_messages: Vec<Message>,
    pub last_online_status: OnlineStatus,
    pub last_online_text: Option<String>,
    /// Server-suggested delay before the next poll.
    pub pull_again_after: Option<Duration>,
    pub peer_name: Option<String>,
    pub gender: Option<Gender>,
}

impl Chat {
    pub fn new(id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: id.into(),
            messages,
            unconsumed_sent_local_messages: Vec::new(),
            last_online_status: OnlineStatus::default(),
            last_online_text: None,
            pull_again_after: None,
            peer_name: None,
            gender: None,
        }
    }

    /// Same chat metadata with a different message list.
    pub fn with_messages(self, messages: Vec<Message>) -> Self {
        Self { messages, ..self }
    }

    pub fn count_peer_messages(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_user_message()).count()
    }

    pub fn count_user_messages(&self) -> usize {
        self.messages.iter().filter(|m| m.is_user_message()).count()
    }
}
