//! JSON bodies exchanged with the chat server.
//!
//! Field names follow the server's camelCase convention. Everything that the
//! server may omit carries a `#[serde(default)]` so older deployments still
//! decode.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{Gender, OnlineStatus};

/// Response of `GET feeds/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Non-empty when the server refused the request.
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
    /// Suggested delay before the next poll, in milliseconds. Zero means no hint.
    #[serde(default)]
    pub pull_again_after: u64,
    pub chat: ChatDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    /// Peer id, which doubles as the conversation id.
    pub id: String,
    #[serde(default)]
    pub messages: Vec<MessageDto>,
    #[serde(default)]
    pub last_online_status: OnlineStatus,
    #[serde(default)]
    pub last_online_text: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
}

/// A message as the server lists it, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    #[serde(default)]
    pub id: String,
    /// Client id echoed back for messages the signed-in user sent.
    #[serde(default)]
    pub client_msg_id: String,
    #[serde(default)]
    pub was_you_sender: bool,
    pub text: String,
    /// Unix epoch millis.
    pub msg_at: i64,
}

impl ChatResponse {
    /// Decode a response body and reject payloads carrying a server error code.
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        let response: Self = serde_json::from_slice(body)?;
        if !response.error_code.is_empty() {
            return Err(ProtocolError::Rejected {
                code: response.error_code,
                message: response.error_message,
            });
        }
        Ok(response)
    }
}

/// Body of `POST actions/actions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitActionsRequest {
    pub actions: Vec<ActionDto>,
}

/// A user action reported to the server. Outgoing chat messages travel as
/// actions of type `MESSAGE`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionDto {
    pub action_type: String,
    /// Unix epoch millis.
    pub action_time: i64,
    pub client_id: String,
    pub text: String,
    pub source_feed: String,
    pub target_user_id: String,
    pub target_image_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitActionsResponse {
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub last_action_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_chat_with_defaults() {
        let body = br#"{
            "pullAgainAfter": 3000,
            "chat": {
                "id": "peer1",
                "lastOnlineStatus": "online",
                "messages": [
                    {"id": "m1", "wasYouSender": false, "text": "hi", "msgAt": 1000},
                    {"id": "m2", "clientMsgId": "_abc_peer1", "wasYouSender": true, "text": "hey", "msgAt": 2000}
                ]
            }
        }"#;

        let response = ChatResponse::from_slice(body).unwrap();
        assert_eq!(response.pull_again_after, 3000);
        assert_eq!(response.chat.last_online_status, OnlineStatus::Online);
        assert_eq!(response.chat.messages.len(), 2);
        assert!(response.chat.messages[0].client_msg_id.is_empty());
        assert_eq!(response.chat.messages[1].client_msg_id, "_abc_peer1");
        assert!(response.chat.name.is_none());
    }

    #[test]
    fn error_code_is_rejected() {
        let body = br#"{"errorCode": "InvalidAccessTokenClientError", "errorMessage": "expired", "chat": {"id": "p"}}"#;
        match ChatResponse::from_slice(body) {
            Err(ProtocolError::Rejected { code, .. }) => {
                assert_eq!(code, "InvalidAccessTokenClientError")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        assert!(matches!(
            ChatResponse::from_slice(b"<html>"),
            Err(ProtocolError::Serialization(_))
        ));
    }

    #[test]
    fn action_serializes_camel_case() {
        let action = ActionDto {
            action_type: "MESSAGE".into(),
            action_time: 5,
            client_id: "_x_p".into(),
            text: "hello".into(),
            source_feed: "messages".into(),
            target_user_id: "p".into(),
            target_image_id: String::new(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["actionType"], "MESSAGE");
        assert_eq!(json["clientId"], "_x_p");
        assert_eq!(json["targetUserId"], "p");
    }
}
