//! Storage collaborator contract.
//!
//! Every method that mutates a counter is a single atomic operation in the
//! backing store. Callers never read a counter and then write it back.

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::types::{AttemptRecord, AttemptUpsert, BurnUpdate, Paste};

/// How a password attempt updates its record.
///
/// The attempt is counted before the password is evaluated. A new record
/// starts at one attempt; an existing record is incremented unless it is
/// locked at `now`. Reaching `threshold` sets `locked_until = lock_until`, so
/// a burst of concurrent attempts gets exactly `threshold` evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRule {
    pub threshold: u32,
    pub now: DateTime<Utc>,
    pub lock_until: DateTime<Utc>,
}

impl AttemptRule {
    /// Record to insert when none exists yet.
    pub fn on_new(&self) -> AttemptRecord {
        AttemptRecord {
            attempts: 1,
            locked_until: (1 >= self.threshold).then_some(self.lock_until),
        }
    }

    /// Record that replaces `existing`, or `None` while it is locked.
    pub fn on_existing(&self, existing: &AttemptRecord) -> Option<AttemptRecord> {
        if existing.is_locked(self.now) {
            return None;
        }
        let attempts = existing.attempts.saturating_add(1);
        Some(AttemptRecord {
            attempts,
            locked_until: if attempts >= self.threshold {
                Some(self.lock_until)
            } else {
                existing.locked_until
            },
        })
    }
}

pub trait PasteStore: Send + Sync {
    /// Fails with `StorageError::Duplicate` if the id is taken.
    fn insert_paste(&self, paste: &Paste) -> Result<(), StorageError>;

    fn get_paste(&self, id: &str) -> Result<Option<Paste>, StorageError>;

    /// Physically remove a paste. Returns whether it existed.
    fn delete_paste(&self, id: &str) -> Result<bool, StorageError>;

    /// Decrement `remaining_views` only if it is currently above zero.
    fn conditional_decrement_burn(&self, id: &str) -> Result<BurnUpdate, StorageError>;

    fn get_attempt(
        &self,
        paste_id: &str,
        client_key: &str,
    ) -> Result<Option<AttemptRecord>, StorageError>;

    /// Insert-or-increment the attempt record in one atomic step, refusing
    /// while the record is locked. See [`AttemptRule`].
    fn upsert_attempt(
        &self,
        paste_id: &str,
        client_key: &str,
        rule: &AttemptRule,
    ) -> Result<AttemptUpsert, StorageError>;

    /// Set an existing record back to zero attempts with no lock.
    fn reset_attempt(&self, paste_id: &str, client_key: &str) -> Result<(), StorageError>;
}
