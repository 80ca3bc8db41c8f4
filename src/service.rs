//! PasteService: create, inspect, read, unlock and delete pastes.
//!
//! Wires the cipher, rate limiter, credential guard, burn counter and session
//! signer around one storage collaborator. Transport concerns (routing,
//! cookies, status codes) stay outside; every method takes already-extracted
//! inputs such as the client key.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::burn::{BurnCounter, ViewOutcome};
use crate::cipher::ContentCipher;
use crate::clock::Clock;
use crate::config::{GuardConfig, ENV_ADMIN_PASSWORD_HASH};
use crate::credential::{hash_password, CredentialGuard, UnlockOutcome};
use crate::error::{ConfigError, GuardError, Result, StorageError};
use crate::ids::{generate_id, DEFAULT_ID_LENGTH};
use crate::input::{validate_paste_id, validate_password, CreatePaste};
use crate::rate_limiter::RateLimiter;
use crate::session::SessionSigner;
use crate::storage::PasteStore;
use crate::types::{Paste, PasteState};

/// Attempts at finding an unused id before giving up.
const MAX_ID_ATTEMPTS: usize = 3;

/// Key prefix separating admin-login buckets from create buckets.
const ADMIN_LOGIN_BUCKET: &str = "admin-login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPaste {
    pub id: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_views: Option<u32>,
}

/// Metadata visible without revealing content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteStatus {
    pub id: String,
    pub language: String,
    pub has_password: bool,
    pub remaining_views: Option<u32>,
    pub state: PasteState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedPaste {
    pub content: String,
    pub language: String,
    /// Views left after this read, `None` for unlimited pastes.
    pub remaining_views: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockResult {
    Revealed(RevealedPaste),
    Rejected { attempts_remaining: u32 },
    LockedOut { retry_after: Duration },
}

pub struct PasteService {
    store: Arc<dyn PasteStore>,
    cipher: Arc<ContentCipher>,
    limiter: RateLimiter,
    guard: CredentialGuard,
    burn: BurnCounter,
    sessions: SessionSigner,
    admin_password_hash: Option<String>,
    clock: Arc<dyn Clock>,
}

impl PasteService {
    /// Build the service. A bad key or secret fails here, before any request
    /// is served.
    pub fn new(
        config: &GuardConfig,
        store: Arc<dyn PasteStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let cipher = Arc::new(ContentCipher::from_hex(&config.encryption_key)?);
        let sessions = SessionSigner::new(
            config.session_secret.as_bytes(),
            config.session_ttl,
            clock.clone(),
        )?;

        Ok(Self {
            limiter: RateLimiter::new(config.rate_limit, clock.clone()),
            guard: CredentialGuard::new(store.clone(), cipher.clone(), config.lockout, clock.clone()),
            burn: BurnCounter::new(store.clone()),
            admin_password_hash: config.admin_password_hash.clone(),
            store,
            cipher,
            sessions,
            clock,
        })
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn sessions(&self) -> &SessionSigner {
        &self.sessions
    }

    pub fn create(&self, client_key: &str, request: CreatePaste) -> Result<CreatedPaste> {
        self.admit(client_key)?;
        let input = request.validate()?;

        let now = self.clock.now();
        let expires_at = input
            .expires_in_minutes
            .map(|minutes| now + chrono::Duration::minutes(i64::from(minutes)));
        let encrypted_body = self.cipher.encrypt(input.content.as_bytes())?;

        let mut paste = Paste {
            id: String::new(),
            encrypted_body,
            language: input.language,
            password_hash: input.password.as_deref().map(hash_password),
            created_at: now,
            expires_at,
            remaining_views: input.burn_after_read,
        };

        for attempt in 1..=MAX_ID_ATTEMPTS {
            paste.id = generate_id(DEFAULT_ID_LENGTH)?;
            match self.store.insert_paste(&paste) {
                Ok(()) => {
                    debug!(
                        paste_id = %paste.id,
                        protected = paste.is_protected(),
                        burn = ?paste.remaining_views,
                        "paste created"
                    );
                    return Ok(CreatedPaste {
                        id: paste.id,
                        expires_at,
                        remaining_views: paste.remaining_views,
                    });
                }
                Err(StorageError::Duplicate(id)) if attempt < MAX_ID_ATTEMPTS => {
                    debug!(paste_id = %id, "id collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StorageError::Duplicate(paste.id).into())
    }

    pub fn status(&self, id: &str) -> Result<PasteStatus> {
        validate_paste_id(id)?;
        let paste = self.store.get_paste(id)?.ok_or(GuardError::NotFound)?;
        Ok(PasteStatus {
            state: paste.state(self.clock.now()),
            has_password: paste.is_protected(),
            remaining_views: paste.remaining_views,
            language: paste.language,
            id: paste.id,
        })
    }

    /// Read an unprotected paste, consuming one view if it is burn-limited.
    pub fn view(&self, id: &str) -> Result<RevealedPaste> {
        let paste = self.load_readable(id)?;
        if paste.is_protected() {
            return Err(GuardError::PasswordRequired);
        }
        let plaintext = self.decrypt(&paste)?;
        self.reveal(&paste, plaintext)
    }

    /// Read a protected paste with a password.
    ///
    /// Unprotected pastes are served as by [`PasteService::view`].
    pub fn unlock(&self, id: &str, client_key: &str, password: &str) -> Result<UnlockResult> {
        validate_password(password)?;
        let paste = self.load_readable(id)?;
        if !paste.is_protected() {
            let plaintext = self.decrypt(&paste)?;
            return self.reveal(&paste, plaintext).map(UnlockResult::Revealed);
        }

        match self.guard.unlock(client_key, &paste, password)? {
            UnlockOutcome::Revealed(plaintext) => {
                let content = utf8(&paste, plaintext.to_vec())?;
                self.reveal(&paste, content).map(UnlockResult::Revealed)
            }
            UnlockOutcome::Rejected { attempts_remaining } => {
                Ok(UnlockResult::Rejected { attempts_remaining })
            }
            UnlockOutcome::LockedOut { retry_after } => Ok(UnlockResult::LockedOut { retry_after }),
        }
    }

    /// Exchange the admin password for a session token.
    ///
    /// The password is checked against the configured bcrypt hash. A server
    /// without one reports a configuration error rather than a bad password.
    pub fn admin_login(&self, client_key: &str, password: &str) -> Result<String> {
        self.admit(&format!("{ADMIN_LOGIN_BUCKET}:{client_key}"))?;
        let Some(expected) = self.admin_password_hash.as_deref() else {
            error!("admin login attempted but no admin password hash is configured");
            return Err(ConfigError::Missing(ENV_ADMIN_PASSWORD_HASH).into());
        };
        if password.is_empty() {
            return Err(GuardError::Unauthorized);
        }
        let matches = bcrypt::verify(password, expected).map_err(|e| {
            error!(error = %e, "configured admin password hash is unusable");
            ConfigError::Invalid {
                field: "admin_password_hash",
                reason: e.to_string(),
            }
        })?;
        if !matches {
            warn!(client_key, "admin login rejected");
            return Err(GuardError::Unauthorized);
        }
        info!(client_key, "admin session issued");
        self.sessions.issue(&self.sessions.admin_claim())
    }

    /// Physically delete a paste. Requires an admin session.
    pub fn delete(&self, token: Option<&str>, id: &str) -> Result<()> {
        self.sessions.authorize_admin(token)?;
        validate_paste_id(id)?;
        if !self.store.delete_paste(id)? {
            return Err(GuardError::NotFound);
        }
        info!(paste_id = id, "paste deleted by admin");
        Ok(())
    }

    fn admit(&self, key: &str) -> Result<()> {
        let decision = self.limiter.consume(key);
        if decision.allowed {
            return Ok(());
        }
        Err(GuardError::RateLimited {
            retry_after: decision.retry_after(self.clock.now()),
        })
    }

    /// Fetch a paste that may still be read: present, not expired, not burned.
    fn load_readable(&self, id: &str) -> Result<Paste> {
        validate_paste_id(id)?;
        let paste = self.store.get_paste(id)?.ok_or(GuardError::NotFound)?;
        match paste.state(self.clock.now()) {
            PasteState::Active => Ok(paste),
            PasteState::Expired => Err(GuardError::Expired),
            PasteState::Destroyed => Err(GuardError::Destroyed),
        }
    }

    fn decrypt(&self, paste: &Paste) -> Result<String> {
        let plaintext = self.cipher.decrypt(&paste.encrypted_body).map_err(|e| {
            warn!(paste_id = %paste.id, error = %e, "failed to decrypt paste");
            e
        })?;
        utf8(paste, plaintext)
    }

    /// Consume a view, then hand out content. Decryption happens before this
    /// so an integrity failure never burns a view.
    fn reveal(&self, paste: &Paste, content: String) -> Result<RevealedPaste> {
        let outcome = self.burn.consume_view(&paste.id)?;
        if outcome == ViewOutcome::Destroyed {
            return Err(GuardError::Destroyed);
        }
        Ok(RevealedPaste {
            content,
            language: paste.language.clone(),
            remaining_views: outcome.remaining_after(),
        })
    }
}

fn utf8(paste: &Paste, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| {
        warn!(paste_id = %paste.id, "decrypted paste is not valid UTF-8");
        GuardError::ContentUnavailable
    })
}
