//! MemoryStore: a `PasteStore` held entirely in process memory.
//!
//! Each contract method takes the state lock exactly once, so every call is
//! atomic with respect to every other call on the same store.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::StorageError;
use crate::types::{AttemptRecord, AttemptUpsert, BurnUpdate, Paste};

use super::traits::{AttemptRule, PasteStore};

#[derive(Default)]
struct MemoryState {
    pastes: HashMap<String, Paste>,
    /// (paste id, client key) → record
    attempts: HashMap<(String, String), AttemptRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasteStore for MemoryStore {
    fn insert_paste(&self, paste: &Paste) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if state.pastes.contains_key(&paste.id) {
            return Err(StorageError::Duplicate(paste.id.clone()));
        }
        state.pastes.insert(paste.id.clone(), paste.clone());
        Ok(())
    }

    fn get_paste(&self, id: &str) -> Result<Option<Paste>, StorageError> {
        Ok(self.state.lock().pastes.get(id).cloned())
    }

    fn delete_paste(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.state.lock().pastes.remove(id).is_some())
    }

    fn conditional_decrement_burn(&self, id: &str) -> Result<BurnUpdate, StorageError> {
        let mut state = self.state.lock();
        let Some(paste) = state.pastes.get_mut(id) else {
            return Ok(BurnUpdate::NotFound);
        };
        Ok(match paste.remaining_views {
            None => BurnUpdate::Unlimited,
            Some(0) => BurnUpdate::AlreadyZero,
            Some(n) => {
                paste.remaining_views = Some(n - 1);
                BurnUpdate::Decremented(n - 1)
            }
        })
    }

    fn get_attempt(
        &self,
        paste_id: &str,
        client_key: &str,
    ) -> Result<Option<AttemptRecord>, StorageError> {
        let key = (paste_id.to_string(), client_key.to_string());
        Ok(self.state.lock().attempts.get(&key).copied())
    }

    fn upsert_attempt(
        &self,
        paste_id: &str,
        client_key: &str,
        rule: &AttemptRule,
    ) -> Result<AttemptUpsert, StorageError> {
        let key = (paste_id.to_string(), client_key.to_string());
        let mut state = self.state.lock();
        let next = match state.attempts.get(&key) {
            Some(existing) => match rule.on_existing(existing) {
                Some(next) => next,
                None => return Ok(AttemptUpsert::Locked(*existing)),
            },
            None => rule.on_new(),
        };
        state.attempts.insert(key, next);
        Ok(AttemptUpsert::Counted(next))
    }

    fn reset_attempt(&self, paste_id: &str, client_key: &str) -> Result<(), StorageError> {
        let key = (paste_id.to_string(), client_key.to_string());
        if let Some(record) = self.state.lock().attempts.get_mut(&key) {
            *record = AttemptRecord::default();
        }
        Ok(())
    }
}
