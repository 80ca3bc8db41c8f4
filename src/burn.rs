//! Burn-after-read view accounting.

use std::sync::Arc;

use tracing::info;

use crate::error::GuardError;
use crate::storage::PasteStore;
use crate::types::BurnUpdate;

/// Result of consuming one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    /// No view limit; nothing was decremented.
    Unlimited,
    /// This call was granted a view. `remaining == 0` means it was the last.
    Revealed { remaining: u32 },
    /// The counter was already zero. Terminal: treat as not found.
    Destroyed,
}

impl ViewOutcome {
    /// Remaining views after this call, `None` for unlimited pastes.
    pub fn remaining_after(&self) -> Option<u32> {
        match self {
            ViewOutcome::Unlimited => None,
            ViewOutcome::Revealed { remaining } => Some(*remaining),
            ViewOutcome::Destroyed => Some(0),
        }
    }

    pub fn is_granted(&self) -> bool {
        !matches!(self, ViewOutcome::Destroyed)
    }
}

pub struct BurnCounter {
    store: Arc<dyn PasteStore>,
}

impl BurnCounter {
    pub fn new(store: Arc<dyn PasteStore>) -> Self {
        Self { store }
    }

    /// Atomically take one view from `paste_id`.
    ///
    /// For a paste created with N views, at most N calls ever see
    /// `Revealed`, however many run concurrently.
    pub fn consume_view(&self, paste_id: &str) -> Result<ViewOutcome, GuardError> {
        match self.store.conditional_decrement_burn(paste_id)? {
            BurnUpdate::Unlimited => Ok(ViewOutcome::Unlimited),
            BurnUpdate::Decremented(remaining) => {
                if remaining == 0 {
                    info!(paste_id, "paste reached its view limit and is destroyed");
                }
                Ok(ViewOutcome::Revealed { remaining })
            }
            BurnUpdate::AlreadyZero => Ok(ViewOutcome::Destroyed),
            BurnUpdate::NotFound => Err(GuardError::NotFound),
        }
    }
}
