use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// AES-GCM nonce length in bytes (96 bits per NIST recommendation).
pub const AES_GCM_NONCE_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// AES key length in bytes (256 bits).
pub const AES_KEY_LENGTH: usize = 32;

/// Separator between hex ciphertext and hex tag in the stored body.
pub const BODY_SEPARATOR: char = ':';

/// Default language tag for pastes created without one.
pub const DEFAULT_LANGUAGE: &str = "plaintext";

/// Ciphertext, tag and nonce for one encrypted paste body.
///
/// Only [`crate::cipher::ContentCipher::encrypt`] produces new blobs, so the
/// nonce is always freshly drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub ciphertext: Vec<u8>,
    pub auth_tag: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// A stored paste as the storage collaborator returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paste {
    pub id: String,
    pub encrypted_body: EncryptedBlob,
    pub language: String,
    /// Hex SHA-256 of the password, `None` for unprotected pastes.
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// `None` means unlimited views.
    pub remaining_views: Option<u32>,
}

impl Paste {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_destroyed(&self) -> bool {
        self.remaining_views == Some(0)
    }

    pub fn is_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn state(&self, now: DateTime<Utc>) -> PasteState {
        if self.is_expired(now) {
            PasteState::Expired
        } else if self.is_destroyed() {
            PasteState::Destroyed
        } else {
            PasteState::Active
        }
    }
}

/// Lifecycle state visible to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasteState {
    Active,
    Expired,
    Destroyed,
}

/// Failed-password bookkeeping for one `(paste_id, client_key)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttemptRecord {
    pub attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Result of one atomic burn decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnUpdate {
    /// Counter was positive and is now `remaining`.
    Decremented(u32),
    /// Counter was already zero; nothing changed.
    AlreadyZero,
    /// Paste has no view limit.
    Unlimited,
    NotFound,
}

/// Result of one atomic attempt upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptUpsert {
    /// The attempt was counted; holds the post-update record.
    Counted(AttemptRecord),
    /// The record was locked at `now`; nothing changed.
    Locked(AttemptRecord),
}
