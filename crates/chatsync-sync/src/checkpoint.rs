//! Source of the "last action time" checkpoint sent with every fetch.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

pub trait CheckpointProvider: Send + Sync {
    /// Last recorded local action time, Unix millis. Never decreases.
    fn checkpoint(&self) -> i64;

    /// Note a local action at `at`. Read-only providers ignore it.
    fn record_action(&self, _at: DateTime<Utc>) {}
}

/// In-process checkpoint that advances whenever the user acts (sends a
/// message). Concurrent updates keep the maximum.
#[derive(Debug, Default)]
pub struct ActionClock {
    last_action_ms: AtomicI64,
}

impl ActionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously persisted checkpoint.
    pub fn starting_at(last_action_ms: i64) -> Self {
        Self {
            last_action_ms: AtomicI64::new(last_action_ms),
        }
    }

    /// Record an action at `at`. Older instants are ignored.
    pub fn record(&self, at: DateTime<Utc>) -> i64 {
        let ms = at.timestamp_millis();
        self.last_action_ms.fetch_max(ms, Ordering::SeqCst).max(ms)
    }
}

impl CheckpointProvider for ActionClock {
    fn checkpoint(&self) -> i64 {
        self.last_action_ms.load(Ordering::SeqCst)
    }

    fn record_action(&self, at: DateTime<Utc>) {
        self.record(at);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = ActionClock::new();
        assert_eq!(clock.checkpoint(), 0);

        let later = Utc.timestamp_millis_opt(2_000).unwrap();
        let earlier = Utc.timestamp_millis_opt(1_000).unwrap();

        assert_eq!(clock.record(later), 2_000);
        assert_eq!(clock.record(earlier), 2_000);
        assert_eq!(clock.checkpoint(), 2_000);
    }

    #[test]
    fn starting_point_is_kept() {
        let clock = ActionClock::starting_at(42);
        assert_eq!(clock.checkpoint(), 42);
    }
}
