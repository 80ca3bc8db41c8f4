use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CipherError {
    /// Tag mismatch. No plaintext is produced.
    #[error("Integrity check failed: content has been altered or the key is wrong")]
    IntegrityFailure,

    #[error("Encryption key misconfigured: {0}")]
    KeyConfig(String),

    #[error("Malformed encrypted blob: {0}")]
    MalformedBlob(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Paste already exists: {0}")]
    Duplicate(String),

    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Service-level error taxonomy.
///
/// Lockout and rejected passwords are outcomes, not errors; see
/// [`crate::credential::Outcome`].
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Paste not found")]
    NotFound,

    #[error("Paste has expired")]
    Expired,

    #[error("Paste has been destroyed")]
    Destroyed,

    #[error("Password-protected paste must be unlocked with a password")]
    PasswordRequired,

    #[error("Too many requests, retry in {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Content unavailable")]
    ContentUnavailable,

    #[error("Key configuration error: {0}")]
    KeyConfig(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GuardError {
    /// Stable machine-readable code for the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::Validation(_) | GuardError::PasswordRequired => "VALIDATION_ERROR",
            GuardError::NotFound | GuardError::Expired | GuardError::Destroyed => "NOT_FOUND",
            GuardError::RateLimited { .. } => "RATE_LIMITED",
            GuardError::Unauthorized => "UNAUTHORIZED",
            GuardError::ContentUnavailable
            | GuardError::KeyConfig(_)
            | GuardError::Encryption(_)
            | GuardError::Signing(_)
            | GuardError::Storage(_)
            | GuardError::Config(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<CipherError> for GuardError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::IntegrityFailure | CipherError::MalformedBlob(_) => {
                GuardError::ContentUnavailable
            }
            CipherError::KeyConfig(msg) => GuardError::KeyConfig(msg),
            CipherError::EncryptionFailed(msg) | CipherError::RngFailed(msg) => {
                GuardError::Encryption(msg)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
