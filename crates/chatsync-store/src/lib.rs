//! # chatsync-store
//!
//! Local message storage for chatsync, backed by SQLite.
//!
//! Two tables hold received (server-confirmed) messages and sent messages the
//! server has not echoed back yet. The crate exposes a synchronous
//! [`Database`] with typed helpers and the async [`MessageStore`] contract the
//! sync engine consumes.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod store;

mod error;

pub use database::{Database, SharedDatabase};
pub use error::{Result, StoreError};
pub use models::*;
pub use store::{MessageStore, SqliteMessageStore};
