//! Domain model structs persisted in the local database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatsync_shared::constants::CURRENT_USER_ID;
use chatsync_shared::new_client_id;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message, either received from the server or sent locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Server id, or the client id for messages not confirmed yet.
    pub id: String,
    /// Conversation this message belongs to (the peer's user id).
    pub chat_id: String,
    /// Author: the peer's user id or [`CURRENT_USER_ID`].
    pub peer_id: String,
    /// Client-generated id shared by the local echo and the server copy of
    /// a message the signed-in user sent. Empty for peer messages.
    pub client_id: String,
    pub text: String,
    /// Send time for local messages, server time otherwise.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Synthesize the local echo of a message the signed-in user sends now.
    pub fn outgoing(chat_id: &str, text: &str) -> Self {
        let client_id = new_client_id(chat_id);
        Self {
            id: client_id.clone(),
            chat_id: chat_id.to_string(),
            peer_id: CURRENT_USER_ID.to_string(),
            client_id,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Whether the signed-in user authored this message.
    pub fn is_user_message(&self) -> bool {
        self.peer_id == CURRENT_USER_ID
    }

    /// Whether both records describe the same outgoing message.
    pub fn same_client_message(&self, other: &Message) -> bool {
        !self.client_id.is_empty() && self.client_id == other.client_id
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// The two independently addressable message tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTable {
    /// Server-confirmed history.
    Received,
    /// Durable mirror of sent messages the server has not echoed yet.
    Sent,
}

impl MessageTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Received => "received_messages",
            Self::Sent => "sent_messages",
        }
    }
}

impl std::fmt::Display for MessageTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}
