//! Types shared by every chatsync crate: identifiers, constants and the JSON
//! bodies of the chat server.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use types::{new_client_id, Gender, ImageResolution, OnlineStatus};
