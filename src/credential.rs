//! Password verification with per-client brute-force lockout.
//!
//! Paste password digests are unsalted single-round SHA-256 hex strings,
//! matching the stored format. That is cheap to brute-force offline from a
//! leaked database; the lockout below only slows down online guessing.
//!
//! Every attempt is counted in storage before the password is evaluated, in
//! one conditional upsert that refuses while the record is locked. However
//! many workers race, a burst of guesses gets at most `threshold`
//! evaluations before the lock engages.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::cipher::ContentCipher;
use crate::clock::{add_saturating, to_std, Clock};
use crate::config::LockoutPolicy;
use crate::error::GuardError;
use crate::storage::{AttemptRule, PasteStore};
use crate::types::{AttemptUpsert, Paste};

/// Hex SHA-256 of a password, as stored in `Paste::password_hash`.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Constant-time comparison of a candidate password against a stored hex
/// digest. A stored value that is not valid hex never matches.
pub fn password_matches(candidate: &str, stored_hash: &str) -> bool {
    let candidate_digest = Sha256::digest(candidate.as_bytes());
    let Ok(stored) = hex::decode(stored_hash) else {
        warn!("stored password hash is not valid hex");
        return false;
    };
    candidate_digest.as_slice().ct_eq(&stored).into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected { attempts_remaining: u32 },
    LockedOut { retry_after: Duration },
}

/// Outcome of unlocking a protected paste; plaintext only on success.
#[derive(Debug, PartialEq, Eq)]
pub enum UnlockOutcome {
    Revealed(Zeroizing<Vec<u8>>),
    Rejected { attempts_remaining: u32 },
    LockedOut { retry_after: Duration },
}

pub struct CredentialGuard {
    store: Arc<dyn PasteStore>,
    cipher: Arc<ContentCipher>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl CredentialGuard {
    pub fn new(
        store: Arc<dyn PasteStore>,
        cipher: Arc<ContentCipher>,
        policy: LockoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cipher,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Check `candidate` against `stored_hash` for one client.
    ///
    /// The attempt is counted before the digest is computed. An active lock
    /// short-circuits without counting or hashing anything.
    pub fn verify(
        &self,
        client_key: &str,
        paste_id: &str,
        candidate: &str,
        stored_hash: &str,
    ) -> Result<Outcome, GuardError> {
        let now = self.clock.now();
        let rule = AttemptRule {
            threshold: self.policy.threshold,
            now,
            lock_until: add_saturating(now, self.policy.duration),
        };

        let record = match self.store.upsert_attempt(paste_id, client_key, &rule)? {
            AttemptUpsert::Counted(record) => record,
            AttemptUpsert::Locked(record) => {
                let until = record.locked_until.unwrap_or(now);
                debug!(paste_id, client_key, %until, "password attempt while locked out");
                return Ok(Outcome::LockedOut {
                    retry_after: to_std(until - now),
                });
            }
        };

        if password_matches(candidate, stored_hash) {
            self.store.reset_attempt(paste_id, client_key)?;
            return Ok(Outcome::Accepted);
        }

        if record.is_locked(now) {
            warn!(
                paste_id,
                client_key,
                attempts = record.attempts,
                "password lockout engaged"
            );
        }
        Ok(Outcome::Rejected {
            attempts_remaining: self.policy.threshold.saturating_sub(record.attempts),
        })
    }

    /// Verify a password for `paste` and decrypt its body on success.
    ///
    /// The caller is responsible for burn accounting.
    pub fn unlock(
        &self,
        client_key: &str,
        paste: &Paste,
        candidate: &str,
    ) -> Result<UnlockOutcome, GuardError> {
        let Some(stored_hash) = paste.password_hash.as_deref() else {
            return Err(GuardError::Validation("paste is not password protected".into()));
        };

        match self.verify(client_key, &paste.id, candidate, stored_hash)? {
            Outcome::Accepted => {
                let plaintext = self.cipher.decrypt(&paste.encrypted_body).map_err(|e| {
                    warn!(paste_id = %paste.id, error = %e, "failed to decrypt paste");
                    e
                })?;
                Ok(UnlockOutcome::Revealed(Zeroizing::new(plaintext)))
            }
            Outcome::Rejected { attempts_remaining } => {
                Ok(UnlockOutcome::Rejected { attempts_remaining })
            }
            Outcome::LockedOut { retry_after } => Ok(UnlockOutcome::LockedOut { retry_after }),
        }
    }
}
