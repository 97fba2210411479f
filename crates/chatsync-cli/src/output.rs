//! Terminal rendering of messages.

use chatsync_store::Message;
use chatsync_sync::Chat;

/// One line per message: local time, author, text.
pub fn render(message: &Message) -> String {
    let author = if message.is_user_message() {
        "me"
    } else {
        message.peer_id.as_str()
    };
    format!(
        "[{}] {}: {}",
        message.timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"),
        author,
        message.text
    )
}

/// A pending marker is appended to messages the server has not confirmed.
pub fn render_pending(message: &Message) -> String {
    format!("{} (pending)", render(message))
}

/// Lines for the new messages of a reconciled chat.
pub fn render_chat(chat: &Chat) -> Vec<String> {
    chat.messages.iter().map(render).collect()
}
