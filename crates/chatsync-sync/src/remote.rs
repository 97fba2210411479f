//! Contracts of the remote collaborators: fetching a chat and uploading
//! outgoing messages.

use async_trait::async_trait;
use serde::Serialize;

use chatsync_shared::constants::{ACTION_TYPE_MESSAGE, BAD_ID};
use chatsync_shared::protocol::ActionDto;
use chatsync_shared::ImageResolution;
use chatsync_store::Message;

use crate::chat::Chat;
use crate::error::FetchError;

/// Retrieves a conversation from the server.
///
/// `checkpoint` is the last local action time (Unix millis); the server uses
/// it to decide how much history to return. The returned chat lists messages
/// oldest first. Implementations never retry internally.
#[async_trait]
pub trait ChatFetcher: Send + Sync {
    async fn fetch_chat(
        &self,
        chat_id: &str,
        resolution: ImageResolution,
        checkpoint: i64,
    ) -> Result<Chat, FetchError>;
}

/// Context attached to an outgoing message for the server's bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendMeta {
    /// Feed the conversation was opened from.
    pub source_feed: String,
    /// Image the message refers to, if any.
    pub target_image_id: Option<String>,
}

/// An outgoing message handed to the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub message: Message,
    pub meta: SendMeta,
}

impl OutgoingMessage {
    pub fn to_action(&self) -> ActionDto {
        ActionDto {
            action_type: ACTION_TYPE_MESSAGE.to_string(),
            action_time: self.message.timestamp.timestamp_millis(),
            client_id: self.message.client_id.clone(),
            text: self.message.text.clone(),
            source_feed: self.meta.source_feed.clone(),
            target_user_id: self.message.chat_id.clone(),
            target_image_id: self
                .meta
                .target_image_id
                .clone()
                .unwrap_or_else(|| BAD_ID.to_string()),
        }
    }
}

/// Uploads messages the user sent. Confirmation is observed later through
/// reconciliation, never through this call.
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    async fn dispatch(&self, outgoing: &OutgoingMessage) -> Result<(), FetchError>;
}
