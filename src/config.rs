//! Service configuration.
//!
//! Secrets have no defaults: a missing encryption key or session secret is a
//! startup error.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::AES_KEY_LENGTH;

/// Minimum session-signing secret length in bytes.
pub const MIN_SESSION_SECRET_LENGTH: usize = 32;

/// Default session lifetime (7 days).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Upper bound for every configured duration (one year).
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Version prefixes of the bcrypt hashes accepted for the admin password.
const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];
const BCRYPT_HASH_LENGTH: usize = 60;

pub const ENV_ENCRYPTION_KEY: &str = "ENCRYPTION_KEY";
pub const ENV_SESSION_SECRET: &str = "SESSION_SECRET";
pub const ENV_ADMIN_PASSWORD_HASH: &str = "ADMIN_PASSWORD_HASH";

/// Brute-force lockout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LockoutPolicy {
    /// Failed attempts that trigger a lock.
    pub threshold: u32,
    /// How long a lock lasts.
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            duration: Duration::from_secs(15 * 60),
        }
    }
}

/// Token-bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub capacity: u64,
    /// Tokens added per elapsed interval.
    pub refill_amount: u64,
    #[serde(with = "duration_millis")]
    pub refill_interval: Duration,
    /// Buckets untouched this long are evicted by the sweep.
    #[serde(with = "duration_secs")]
    pub idle_ttl: Duration,
    /// Bucket count above which `consume` triggers a sweep.
    pub sweep_threshold: usize,
}

impl RateLimitConfig {
    pub fn new(capacity: u64, refill_amount: u64, refill_interval: Duration) -> Self {
        Self {
            capacity,
            refill_amount,
            refill_interval,
            ..Self::default()
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 60,
            refill_amount: 60,
            refill_interval: Duration::from_secs(60),
            idle_ttl: Duration::from_secs(10 * 60),
            sweep_threshold: 10_000,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct GuardConfig {
    /// 64 hex characters (256-bit AES key).
    pub encryption_key: String,
    pub session_secret: String,
    /// Bcrypt hash of the admin password. Admin login fails with a
    /// configuration error when unset.
    #[serde(default)]
    pub admin_password_hash: Option<String>,
    #[serde(default)]
    pub lockout: LockoutPolicy,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "default_session_ttl", with = "duration_secs")]
    pub session_ttl: Duration,
}

fn default_session_ttl() -> Duration {
    DEFAULT_SESSION_TTL
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("encryption_key", &"[REDACTED]")
            .field("session_secret", &"[REDACTED]")
            .field(
                "admin_password_hash",
                &self.admin_password_hash.as_ref().map(|_| "[REDACTED]"),
            )
            .field("lockout", &self.lockout)
            .field("rate_limit", &self.rate_limit)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

fn is_bcrypt_hash(hash: &str) -> bool {
    hash.len() == BCRYPT_HASH_LENGTH
        && BCRYPT_PREFIXES.iter().any(|prefix| hash.starts_with(prefix))
        && hash.as_bytes()[4..6].iter().all(u8::is_ascii_digit)
        && hash.as_bytes()[6] == b'$'
}

impl GuardConfig {
    pub fn new(encryption_key: impl Into<String>, session_secret: impl Into<String>) -> Self {
        Self {
            encryption_key: encryption_key.into(),
            session_secret: session_secret.into(),
            admin_password_hash: None,
            lockout: LockoutPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    /// Read secrets from the environment and apply defaults for the rest.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`GuardConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let encryption_key =
            non_empty(ENV_ENCRYPTION_KEY).ok_or(ConfigError::Missing(ENV_ENCRYPTION_KEY))?;
        let session_secret =
            non_empty(ENV_SESSION_SECRET).ok_or(ConfigError::Missing(ENV_SESSION_SECRET))?;

        let mut config = Self::new(encryption_key, session_secret);
        config.admin_password_hash = non_empty(ENV_ADMIN_PASSWORD_HASH);
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Invalid {
            field: "config",
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check secret shapes and numeric parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let key = self.encryption_key.trim();
        if key.len() != AES_KEY_LENGTH * 2 || !key.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ConfigError::Invalid {
                field: "encryption_key",
                reason: format!("must be {} hex characters", AES_KEY_LENGTH * 2),
            });
        }
        if self.session_secret.len() < MIN_SESSION_SECRET_LENGTH {
            return Err(ConfigError::Invalid {
                field: "session_secret",
                reason: format!("must be at least {MIN_SESSION_SECRET_LENGTH} bytes"),
            });
        }
        if let Some(hash) = &self.admin_password_hash {
            if !is_bcrypt_hash(hash) {
                return Err(ConfigError::Invalid {
                    field: "admin_password_hash",
                    reason: "must be a $2a$, $2b$ or $2y$ bcrypt hash".into(),
                });
            }
        }
        if self.lockout.threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "lockout.threshold",
                reason: "must be positive".into(),
            });
        }
        if self.rate_limit.capacity == 0 || self.rate_limit.refill_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "rate_limit",
                reason: "capacity and refill_interval must be positive".into(),
            });
        }
        for (field, value) in [
            ("lockout.duration", self.lockout.duration),
            ("rate_limit.refill_interval", self.rate_limit.refill_interval),
            ("rate_limit.idle_ttl", self.rate_limit.idle_ttl),
            ("session_ttl", self.session_ttl),
        ] {
            if value > MAX_DURATION {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must not exceed {}s", MAX_DURATION.as_secs()),
                });
            }
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
