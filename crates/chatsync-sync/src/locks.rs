//! Per-conversation mutual exclusion.
//!
//! Every reconciliation pass holds the lock of its conversation from fetch to
//! persist. Acquisition never waits: a caller that loses the race gets `None`
//! and is expected to skip this try. Distinct conversations never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tracing::trace;

type ConversationMutex = Arc<tokio::sync::Mutex<()>>;

/// Lazily-populated map of one async mutex per conversation.
#[derive(Debug, Default)]
pub struct ConversationLocks {
    // Held only for the lookup/insert, never across an await.
    locks: Mutex<HashMap<String, ConversationMutex>>,
}

/// Proof that the holder owns a conversation. Dropping it releases the lock,
/// so every exit path of the critical section releases exactly once.
#[derive(Debug)]
pub struct ConversationGuard {
    chat_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl ConversationGuard {
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Release the lock now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        trace!(chat_id = %self.chat_id, "conversation lock released");
    }
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, chat_id: &str) -> ConversationMutex {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(chat_id.to_string()).or_default())
    }

    /// Try to take the lock of `chat_id` without waiting.
    pub fn try_acquire(&self, chat_id: &str) -> Option<ConversationGuard> {
        let guard = self.mutex_for(chat_id).try_lock_owned().ok()?;
        trace!(chat_id, "conversation lock acquired");
        Some(ConversationGuard {
            chat_id: chat_id.to_string(),
            _guard: guard,
        })
    }

    pub fn is_locked(&self, chat_id: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .get(chat_id)
            .map(|m| m.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of conversations a lock has been created for.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
