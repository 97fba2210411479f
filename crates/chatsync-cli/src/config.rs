//! CLI configuration loaded from environment variables.
//!
//! Only the conversation id is mandatory; everything else has a default
//! suitable for a local development server.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chatsync_shared::constants::DEFAULT_HTTP_TIMEOUT_SECS;
use chatsync_shared::ImageResolution;
use chatsync_sync::SyncConfig;

#[derive(Clone)]
pub struct CliConfig {
    /// Base URL of the chat API.
    /// Env: `CHATSYNC_SERVER_URL`
    /// Default: `http://127.0.0.1:8080/api`
    pub server_url: String,

    /// Database file. `None` uses the platform data directory.
    /// Env: `CHATSYNC_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Bearer token passed through to the server.
    /// Env: `CHATSYNC_ACCESS_TOKEN`
    pub access_token: Option<String>,

    /// Conversation to sync (the peer's user id).
    /// Env: `CHATSYNC_CHAT_ID`
    pub chat_id: Option<String>,

    /// Image resolution requested with every fetch.
    /// Env: `CHATSYNC_RESOLUTION`
    /// Default: `1080x1440`
    pub resolution: ImageResolution,

    /// Feed reported as the origin of sent messages.
    /// Env: `CHATSYNC_SOURCE_FEED`
    /// Default: `messages`
    pub source_feed: String,

    /// Per-request HTTP timeout.
    /// Env: `CHATSYNC_HTTP_TIMEOUT_SECS`
    /// Default: `15`
    pub http_timeout: Duration,

    /// Engine timings, see [`SyncConfig`].
    pub sync: SyncConfig,
}

// Keeps the access token out of logs.
impl fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliConfig")
            .field("server_url", &self.server_url)
            .field("db_path", &self.db_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("chat_id", &self.chat_id)
            .field("resolution", &self.resolution)
            .field("source_feed", &self.source_feed)
            .field("http_timeout", &self.http_timeout)
            .field("sync", &self.sync)
            .finish()
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080/api".to_string(),
            db_path: None,
            access_token: None,
            chat_id: None,
            resolution: ImageResolution::default(),
            source_feed: "messages".to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            sync: SyncConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("CHATSYNC_SERVER_URL") {
            config.server_url = url;
        }

        config.db_path = non_empty("CHATSYNC_DB_PATH").map(PathBuf::from);
        config.access_token = non_empty("CHATSYNC_ACCESS_TOKEN");
        config.chat_id = non_empty("CHATSYNC_CHAT_ID");

        if let Some(val) = non_empty("CHATSYNC_RESOLUTION") {
            match val.parse::<ImageResolution>() {
                Ok(res) => config.resolution = res,
                Err(e) => tracing::warn!(error = %e, "Invalid CHATSYNC_RESOLUTION, using default"),
            }
        }

        if let Some(feed) = non_empty("CHATSYNC_SOURCE_FEED") {
            config.source_feed = feed;
        }

        if let Some(val) = non_empty("CHATSYNC_HTTP_TIMEOUT_SECS") {
            match val.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.http_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid CHATSYNC_HTTP_TIMEOUT_SECS, using default"),
            }
        }

        config.sync = SyncConfig::from_lookup(&lookup);
        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| env.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.server_url, "http://127.0.0.1:8080/api");
        assert!(config.chat_id.is_none());
        assert_eq!(config.resolution, ImageResolution::R1080x1440);
        assert_eq!(config.http_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_env_overrides() {
        let config = CliConfig::from_lookup(lookup(&[
            ("CHATSYNC_SERVER_URL", "https://chat.example.org/v1"),
            ("CHATSYNC_CHAT_ID", "peer1"),
            ("CHATSYNC_ACCESS_TOKEN", "secret"),
            ("CHATSYNC_RESOLUTION", "480x640"),
            ("CHATSYNC_POLL_INTERVAL_MS", "1000"),
        ]));

        assert_eq!(config.server_url, "https://chat.example.org/v1");
        assert_eq!(config.chat_id.as_deref(), Some("peer1"));
        assert_eq!(config.resolution, ImageResolution::R480x640);
        assert_eq!(config.sync.poll_interval, Duration::from_secs(1));
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = CliConfig::from_lookup(lookup(&[
            ("CHATSYNC_RESOLUTION", "4k"),
            ("CHATSYNC_HTTP_TIMEOUT_SECS", "0"),
            ("CHATSYNC_CHAT_ID", "   "),
        ]));

        assert_eq!(config.resolution, ImageResolution::default());
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert!(config.chat_id.is_none());
    }
}
