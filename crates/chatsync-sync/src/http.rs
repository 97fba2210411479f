//! reqwest-based client for the chat server.
//!
//! Implements both remote contracts: [`ChatFetcher`] over `GET feeds/chat`
//! and [`MessageDispatcher`] over `POST actions/actions`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use tracing::{debug, warn};

use chatsync_shared::constants::{
    ACTIONS_ENDPOINT, CHAT_ENDPOINT, CURRENT_USER_ID, DEFAULT_HTTP_TIMEOUT_SECS,
};
use chatsync_shared::protocol::{
    ChatResponse, CommitActionsRequest, CommitActionsResponse, MessageDto,
};
use chatsync_shared::{ImageResolution, ProtocolError};
use chatsync_store::Message;

use crate::chat::Chat;
use crate::error::FetchError;
use crate::remote::{ChatFetcher, MessageDispatcher, OutgoingMessage};

#[derive(Debug, Clone)]
pub struct HttpChatClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpChatClient {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Result<Self, FetchError> {
        Self::with_timeout(
            base_url,
            access_token,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

/// Map a non-success status to the error taxonomy.
fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(FetchError::Unauthorized)
    } else if status.is_server_error() {
        Err(FetchError::Server {
            status: status.as_u16(),
        })
    } else {
        Err(FetchError::Malformed(format!("unexpected status {status}")))
    }
}

fn rejection_to_error(e: ProtocolError) -> FetchError {
    match e {
        ProtocolError::Rejected { ref code, .. } if code.contains("AccessToken") => {
            FetchError::Unauthorized
        }
        other => other.into(),
    }
}

fn message_from_dto(chat_id: &str, index: usize, dto: MessageDto) -> Result<Message, FetchError> {
    let timestamp = Utc
        .timestamp_millis_opt(dto.msg_at)
        .single()
        .ok_or_else(|| FetchError::Malformed(format!("invalid msgAt {}", dto.msg_at)))?;

    // Positional ids are stable because the server only ever appends.
    let id = if !dto.id.is_empty() {
        dto.id
    } else if !dto.client_msg_id.is_empty() {
        dto.client_msg_id.clone()
    } else {
        format!("{chat_id}#{index}")
    };

    let peer_id = if dto.was_you_sender {
        CURRENT_USER_ID.to_string()
    } else {
        chat_id.to_string()
    };

    Ok(Message {
        id,
        chat_id: chat_id.to_string(),
        peer_id,
        client_id: dto.client_msg_id,
        text: dto.text,
        timestamp,
    })
}

/// Convert a decoded response into the engine's [`Chat`].
pub fn chat_from_response(response: ChatResponse) -> Result<Chat, FetchError> {
    let dto = response.chat;
    if dto.id.is_empty() {
        return Err(FetchError::Malformed("chat without id".into()));
    }

    let messages = dto
        .messages
        .into_iter()
        .enumerate()
        .map(|(i, m)| message_from_dto(&dto.id, i, m))
        .collect::<Result<Vec<_>, _>>()?;

    let mut chat = Chat::new(dto.id, messages);
    chat.last_online_status = dto.last_online_status;
    chat.last_online_text = dto.last_online_text;
    chat.peer_name = dto.name;
    chat.gender = dto.gender;
    chat.pull_again_after =
        (response.pull_again_after > 0).then(|| Duration::from_millis(response.pull_again_after));
    Ok(chat)
}

#[async_trait]
impl ChatFetcher for HttpChatClient {
    async fn fetch_chat(
        &self,
        chat_id: &str,
        resolution: ImageResolution,
        checkpoint: i64,
    ) -> Result<Chat, FetchError> {
        let req = self.http.get(self.url(CHAT_ENDPOINT)).query(&[
            ("resolution", resolution.as_str().to_string()),
            ("userId", chat_id.to_string()),
            ("lastActionTime", checkpoint.to_string()),
        ]);

        let resp = self.authorize(req).send().await?;
        check_status(resp.status())?;
        let body = resp.bytes().await?;

        let response = ChatResponse::from_slice(&body).map_err(rejection_to_error)?;
        let chat = chat_from_response(response)?;
        if chat.id != chat_id {
            warn!(requested = chat_id, received = %chat.id, "Server returned a different chat");
            return Err(FetchError::Malformed(format!(
                "requested chat {chat_id}, got {}",
                chat.id
            )));
        }

        debug!(chat_id, count = chat.messages.len(), "Chat fetched");
        Ok(chat)
    }
}

#[async_trait]
impl MessageDispatcher for HttpChatClient {
    async fn dispatch(&self, outgoing: &OutgoingMessage) -> Result<(), FetchError> {
        let body = CommitActionsRequest {
            actions: vec![outgoing.to_action()],
        };
        let req = self.http.post(self.url(ACTIONS_ENDPOINT)).json(&body);

        let resp = self.authorize(req).send().await?;
        check_status(resp.status())?;
        let bytes = resp.bytes().await?;

        let response: CommitActionsResponse = serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        if !response.error_code.is_empty() {
            return Err(rejection_to_error(ProtocolError::Rejected {
                code: response.error_code,
                message: response.error_message,
            }));
        }

        debug!(
            client_id = %outgoing.message.client_id,
            last_action_time = response.last_action_time,
            "Message action committed"
        );
        Ok(())
    }
}
