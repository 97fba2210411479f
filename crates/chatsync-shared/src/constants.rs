/// Peer id the server and the local store use for messages authored by the
/// signed-in user.
pub const CURRENT_USER_ID: &str = "current_user";

/// Placeholder id for action targets that are not known.
pub const BAD_ID: &str = "";

/// Application name
pub const APP_NAME: &str = "chatsync";

/// Poll interval used until the server suggests one (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Server hints below this value are ignored (milliseconds)
pub const MIN_POLL_INTERVAL_MS: u64 = 500;

/// Delay before retrying an attempt that found its conversation busy (milliseconds)
pub const SKIP_RETRY_DELAY_MS: u64 = 200;

/// Window in which bursts of push notifications collapse into one refresh (milliseconds)
pub const PUSH_DEBOUNCE_MS: u64 = 400;

/// Delay before the first poll tick after subscribing (milliseconds)
pub const INITIAL_POLL_DELAY_MS: u64 = 50;

/// Upper bound on busy retries for one-shot local reads
pub const BUSY_RETRY_LIMIT: u32 = 50;

/// Action type attached to outgoing chat messages
pub const ACTION_TYPE_MESSAGE: &str = "MESSAGE";

/// Chat endpoint path, relative to the API base URL
pub const CHAT_ENDPOINT: &str = "feeds/chat";

/// Action commit endpoint path, relative to the API base URL
pub const ACTIONS_ENDPOINT: &str = "actions/actions";

/// Default HTTP request timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
