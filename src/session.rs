//! HS256-signed admin session tokens.
//!
//! Token format is a compact JWT: `b64url(header).b64url(claims).b64url(mac)`
//! with claims `{"isAdmin", "iat", "exp"}` in Unix seconds. Nothing is stored
//! server-side; a token is valid iff its MAC verifies under the shared secret
//! and `now < exp`.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use crate::clock::{add_saturating, Clock};
use crate::config::MIN_SESSION_SECRET_LENGTH;
use crate::error::{ConfigError, GuardError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClaim {
    pub is_admin: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    #[serde(rename = "isAdmin")]
    is_admin: bool,
    iat: i64,
    exp: i64,
}

pub struct SessionSigner {
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionSigner {
    /// A secret shorter than 32 bytes is refused.
    pub fn new(secret: &[u8], ttl: Duration, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        if secret.len() < MIN_SESSION_SECRET_LENGTH {
            return Err(ConfigError::Invalid {
                field: "session_secret",
                reason: format!("must be at least {MIN_SESSION_SECRET_LENGTH} bytes"),
            });
        }
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            ttl,
            clock,
        })
    }

    /// Build an admin claim issued now and expiring after the configured TTL.
    pub fn admin_claim(&self) -> SessionClaim {
        let now = self.clock.now();
        SessionClaim {
            is_admin: true,
            issued_at: now,
            expires_at: add_saturating(now, self.ttl),
        }
    }

    pub fn issue(&self, claim: &SessionClaim) -> Result<String, GuardError> {
        let header = JwtHeader {
            alg: "HS256".into(),
            typ: "JWT".into(),
        };
        let claims = WireClaims {
            is_admin: claim.is_admin,
            iat: claim.issued_at.timestamp(),
            exp: claim.expires_at.timestamp(),
        };

        let header_json =
            serde_json::to_vec(&header).map_err(|e| GuardError::Signing(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| GuardError::Signing(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let mut mac = self.mac().map_err(GuardError::Signing)?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify signature and expiry. Any failure is `None`.
    pub fn verify(&self, token: &str) -> Option<SessionClaim> {
        let mut parts = token.trim().split('.');
        let (header_b64, claims_b64, sig_b64) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        let sig = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        if mac.verify_slice(&sig).is_err() {
            debug!("session token signature mismatch");
            return None;
        }

        let header: JwtHeader =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64).ok()?).ok()?;
        if header.alg != "HS256" {
            return None;
        }
        let claims: WireClaims =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims_b64).ok()?).ok()?;

        let claim = SessionClaim {
            is_admin: claims.is_admin,
            issued_at: DateTime::from_timestamp(claims.iat, 0)?,
            expires_at: DateTime::from_timestamp(claims.exp, 0)?,
        };
        if self.clock.now() >= claim.expires_at {
            debug!(expired_at = %claim.expires_at, "session token expired");
            return None;
        }
        Some(claim)
    }

    /// Require a valid admin session.
    pub fn authorize_admin(&self, token: Option<&str>) -> Result<SessionClaim, GuardError> {
        token
            .and_then(|t| self.verify(t))
            .filter(|claim| claim.is_admin)
            .ok_or(GuardError::Unauthorized)
    }

    fn mac(&self) -> Result<HmacSha256, String> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| e.to_string())
    }
}
