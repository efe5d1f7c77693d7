//! In-memory table of members inside the unverified window.
//!
//! One entry per user. Entries are created on join and removed exactly once,
//! either by a successful greeting or by the deadline firing. Both resolution
//! paths go through the same atomic [`PendingRegistry::resolve`], so whichever
//! handler observes the entry first wins and the loser no-ops.

use std::collections::HashMap;
use std::sync::Mutex;

use teloxide::types::{ChatId, MessageId, UserId};
use tokio::task::JoinHandle;

/// Owned handle to a scheduled deadline task.
///
/// Held inside the registry entry; the success path cancels it before the
/// entry is dropped. Cancelling a task that has already run to completion is
/// a no-op.
#[derive(Debug)]
pub struct DeadlineHandle {
    task: JoinHandle<()>,
}

impl DeadlineHandle {
    /// Wrap a spawned deadline task.
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Cancel the deadline. Safe to call after the task has already fired.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

/// One member's unresolved verification window.
#[derive(Debug)]
pub struct PendingVerification {
    /// Chat the member joined.
    pub chat: ChatId,
    /// Scheduled restriction task; cancelled on success.
    pub deadline: DeadlineHandle,
    /// The welcome prompt, deleted when the entry resolves.
    pub prompt_message: MessageId,
    /// Chat title snapshot taken at join time.
    pub group_name: String,
}

/// Tracks in-flight verifications keyed by user.
///
/// Uses a sync [`Mutex`] since the critical sections are brief (no awaits).
/// The registry only mutates its own table; sending, deleting and restricting
/// are the state machine's job.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    pending: Mutex<HashMap<UserId, PendingVerification>>,
}

impl PendingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry for `user`, returning any displaced prior entry.
    ///
    /// A repeat join while still pending replaces the old entry; the caller
    /// is responsible for cancelling the displaced deadline.
    pub fn register(
        &self,
        user: UserId,
        entry: PendingVerification,
    ) -> Option<PendingVerification> {
        match self.pending.lock() {
            Ok(mut map) => map.insert(user, entry),
            Err(_) => None,
        }
    }

    /// Atomically remove and return the entry for `user`.
    ///
    /// Returns `None` if the user is not pending; a stale resolve is a
    /// normal no-op, not an error.
    pub fn resolve(&self, user: UserId) -> Option<PendingVerification> {
        match self.pending.lock() {
            Ok(mut map) => map.remove(&user),
            Err(_) => None,
        }
    }

    /// Non-mutating membership check.
    pub fn is_pending(&self, user: UserId) -> bool {
        match self.pending.lock() {
            Ok(map) => map.contains_key(&user),
            Err(_) => false,
        }
    }
}
