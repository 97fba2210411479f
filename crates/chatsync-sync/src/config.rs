//! Engine timing configuration loaded from environment variables.
//!
//! Every setting has a default so the engine runs with zero configuration.

use std::time::Duration;

use chatsync_shared::constants::{
    BUSY_RETRY_LIMIT, DEFAULT_POLL_INTERVAL_MS, INITIAL_POLL_DELAY_MS, MIN_POLL_INTERVAL_MS,
    PUSH_DEBOUNCE_MS, SKIP_RETRY_DELAY_MS,
};

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Poll interval used until the server suggests one. Never below
    /// `min_poll_interval`.
    /// Env: `CHATSYNC_POLL_INTERVAL_MS`
    /// Default: `5000`
    pub poll_interval: Duration,

    /// Server hints shorter than this are ignored.
    /// Env: `CHATSYNC_MIN_POLL_INTERVAL_MS`
    /// Default: `500`
    pub min_poll_interval: Duration,

    /// Wait before retrying an attempt that found its conversation busy.
    /// Env: `CHATSYNC_SKIP_RETRY_DELAY_MS`
    /// Default: `200`
    pub skip_retry_delay: Duration,

    /// Push notifications closer together than this collapse into one refresh.
    /// Env: `CHATSYNC_PUSH_DEBOUNCE_MS`
    /// Default: `400`
    pub push_debounce: Duration,

    /// Delay before the first poll tick of a subscription.
    /// Env: `CHATSYNC_INITIAL_POLL_DELAY_MS`
    /// Default: `50`
    pub initial_poll_delay: Duration,

    /// Busy retries allowed for one-shot operations before giving up.
    /// Env: `CHATSYNC_BUSY_RETRY_LIMIT`
    /// Default: `50`
    pub busy_retry_limit: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            min_poll_interval: Duration::from_millis(MIN_POLL_INTERVAL_MS),
            skip_retry_delay: Duration::from_millis(SKIP_RETRY_DELAY_MS),
            push_debounce: Duration::from_millis(PUSH_DEBOUNCE_MS),
            initial_poll_delay: Duration::from_millis(INITIAL_POLL_DELAY_MS),
            busy_retry_limit: BUSY_RETRY_LIMIT,
        }
    }
}

impl SyncConfig {
    /// `poll_interval`, raised to `min_poll_interval` if shorter.
    pub fn base_poll_interval(&self) -> Duration {
        self.poll_interval.max(self.min_poll_interval)
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let millis = |key: &str, target: &mut Duration| {
            if let Some(val) = lookup(key) {
                match val.trim().parse::<u64>() {
                    Ok(ms) => *target = Duration::from_millis(ms),
                    Err(_) => tracing::warn!(key, value = %val, "Invalid duration, using default"),
                }
            }
        };

        millis("CHATSYNC_POLL_INTERVAL_MS", &mut config.poll_interval);
        millis("CHATSYNC_MIN_POLL_INTERVAL_MS", &mut config.min_poll_interval);
        millis("CHATSYNC_SKIP_RETRY_DELAY_MS", &mut config.skip_retry_delay);
        millis("CHATSYNC_PUSH_DEBOUNCE_MS", &mut config.push_debounce);
        millis("CHATSYNC_INITIAL_POLL_DELAY_MS", &mut config.initial_poll_delay);

        if let Some(val) = lookup("CHATSYNC_BUSY_RETRY_LIMIT") {
            match val.trim().parse::<u32>() {
                Ok(n) => config.busy_retry_limit = n,
                Err(_) => tracing::warn!(value = %val, "Invalid CHATSYNC_BUSY_RETRY_LIMIT, using default"),
            }
        }

        if config.poll_interval < config.min_poll_interval {
            tracing::warn!(
                poll_interval_ms = config.poll_interval.as_millis() as u64,
                min_poll_interval_ms = config.min_poll_interval.as_millis() as u64,
                "CHATSYNC_POLL_INTERVAL_MS below the minimum, clamping"
            );
            config.poll_interval = config.min_poll_interval;
        }

        config
    }
}
