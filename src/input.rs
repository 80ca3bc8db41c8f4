//! Validated request inputs.
//!
//! Raw request bodies are deserialized into these structs and checked here,
//! so nothing malformed reaches the cipher, the guard or storage.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::GuardError;
use crate::types::DEFAULT_LANGUAGE;

pub const MAX_CONTENT_CHARS: usize = 500_000;
pub const MAX_PASSWORD_CHARS: usize = 1_000;
pub const MAX_BURN_VIEWS: u32 = 10;
/// Allowed expiry choices in minutes.
pub const VALID_EXPIRY_MINUTES: &[u32] = &[5, 30, 60, 1440, 10080, 43200];

static PASTE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("static regex"));
static LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+#._-]{1,32}$").expect("static regex"));

/// Body of a create request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePaste {
    pub content: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u32>,
    #[serde(default)]
    pub burn_after_read: Option<u32>,
}

/// A create request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPaste {
    pub content: String,
    pub language: String,
    pub password: Option<String>,
    pub expires_in_minutes: Option<u32>,
    pub burn_after_read: Option<u32>,
}

impl CreatePaste {
    pub fn from_json(body: &str) -> Result<Self, GuardError> {
        serde_json::from_str(body).map_err(|e| GuardError::Validation(format!("invalid body: {e}")))
    }

    pub fn validate(self) -> Result<ValidatedPaste, GuardError> {
        if self.content.is_empty() {
            return Err(GuardError::Validation("content is required".into()));
        }
        if self.content.chars().count() > MAX_CONTENT_CHARS {
            return Err(GuardError::Validation(format!(
                "content exceeds maximum length of {MAX_CONTENT_CHARS} characters"
            )));
        }

        let language = match self.language.filter(|l| !l.is_empty()) {
            None => DEFAULT_LANGUAGE.to_string(),
            Some(l) if LANGUAGE.is_match(&l) => l,
            Some(_) => return Err(GuardError::Validation("invalid language".into())),
        };

        if let Some(minutes) = self.expires_in {
            if !VALID_EXPIRY_MINUTES.contains(&minutes) {
                return Err(GuardError::Validation("invalid expiresIn value".into()));
            }
        }

        if let Some(views) = self.burn_after_read {
            if !(1..=MAX_BURN_VIEWS).contains(&views) {
                return Err(GuardError::Validation(format!(
                    "burnAfterRead must be an integer between 1 and {MAX_BURN_VIEWS}"
                )));
            }
        }

        if let Some(password) = &self.password {
            validate_password(password)?;
        }

        Ok(ValidatedPaste {
            content: self.content,
            language,
            password: self.password,
            expires_in_minutes: self.expires_in,
            burn_after_read: self.burn_after_read,
        })
    }
}

/// Non-empty and at most `MAX_PASSWORD_CHARS` characters.
pub fn validate_password(password: &str) -> Result<(), GuardError> {
    if password.is_empty() {
        return Err(GuardError::Validation("password is required".into()));
    }
    if password.chars().count() > MAX_PASSWORD_CHARS {
        return Err(GuardError::Validation("password too long".into()));
    }
    Ok(())
}

pub fn validate_paste_id(id: &str) -> Result<(), GuardError> {
    if PASTE_ID.is_match(id) {
        Ok(())
    } else {
        Err(GuardError::Validation("malformed paste id".into()))
    }
}
