//! Access-control core for a paste-sharing service.
//!
//! Paste bodies are sealed with AES-256-GCM before storage. Reads are gated by
//! an optional password with per-client lockout, an optional view limit that
//! is consumed atomically, and per-client token-bucket rate limiting. Admin
//! actions require an HS256 session token.

pub mod burn;
pub mod cipher;
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod ids;
pub mod input;
pub mod rate_limiter;
pub mod service;
pub mod session;
pub mod storage;
pub mod types;

pub use burn::{BurnCounter, ViewOutcome};
pub use cipher::ContentCipher;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{GuardConfig, LockoutPolicy, RateLimitConfig};
pub use credential::{hash_password, password_matches, CredentialGuard, Outcome, UnlockOutcome};
pub use error::{CipherError, ConfigError, GuardError, Result, StorageError};
pub use input::{CreatePaste, ValidatedPaste};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use service::{CreatedPaste, PasteService, PasteStatus, RevealedPaste, UnlockResult};
pub use session::{SessionClaim, SessionSigner};
pub use storage::{AttemptRule, MemoryStore, PasteStore};
#[cfg(feature = "sqlite")]
pub use storage::SqliteStore;
pub use types::{AttemptRecord, AttemptUpsert, BurnUpdate, EncryptedBlob, Paste, PasteState};
