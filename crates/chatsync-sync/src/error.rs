use thiserror::Error;

use chatsync_shared::ProtocolError;
use chatsync_store::StoreError;

/// Failure of a single remote call. Fetchers never retry on their own.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Timeout, refused connection, DNS failure and the like.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a 5xx status.
    #[error("Server error: HTTP {status}")]
    Server { status: u16 },

    /// Stale or revoked credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// The response could not be decoded or broke the protocol.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Transport failures are worth another attempt on the next tick;
    /// protocol failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }
}

impl From<ProtocolError> for FetchError {
    fn from(e: ProtocolError) -> Self {
        Self::Malformed(e.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Malformed(e.to_string());
        }
        match e.status() {
            Some(s) if s.as_u16() == 401 || s.as_u16() == 403 => Self::Unauthorized,
            Some(s) if s.is_server_error() => Self::Server { status: s.as_u16() },
            Some(s) => Self::Malformed(format!("unexpected status {s}")),
            None => Self::Network(e.to_string()),
        }
    }
}

/// Errors surfaced by the sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Another reconciliation holds the conversation lock. Not a failure:
    /// try again shortly.
    #[error("Conversation {0} is busy, skipping this try")]
    Busy(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Message text is empty")]
    EmptyMessage,
}

impl SyncError {
    /// Whether this is the lock-busy condition.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// Whether the poller should swallow this error and wait for the next tick.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Busy(_) => true,
            Self::Fetch(e) => e.is_transient(),
            Self::Store(_) | Self::EmptyMessage => false,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
