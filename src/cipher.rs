//! AES-256-GCM encryption for paste bodies at rest.
//!
//! Stored format: body `hex(ciphertext):hex(tag)`, nonce `hex(nonce)` in a
//! separate column.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use zeroize::Zeroizing;

use crate::error::CipherError;
use crate::types::{
    EncryptedBlob, AES_GCM_NONCE_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, BODY_SEPARATOR,
};

/// Generate a random 12-byte nonce for AES-GCM.
fn generate_nonce() -> Result<[u8; AES_GCM_NONCE_LENGTH], CipherError> {
    let mut nonce = [0u8; AES_GCM_NONCE_LENGTH];
    getrandom::getrandom(&mut nonce).map_err(|e| CipherError::RngFailed(e.to_string()))?;
    Ok(nonce)
}

/// AES-256-GCM cipher holding the service's content key.
///
/// Nonces are never accepted from callers: every `encrypt` draws a fresh one
/// from the OS RNG.
pub struct ContentCipher {
    cipher: Aes256Gcm,
}

impl ContentCipher {
    /// Create a cipher from 32 bytes of raw key material.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != AES_KEY_LENGTH {
            return Err(CipherError::KeyConfig(format!(
                "expected {} bytes, got {}",
                AES_KEY_LENGTH,
                key.len()
            )));
        }
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|e| CipherError::KeyConfig(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Create a cipher from a 64-character hex key.
    pub fn from_hex(key_hex: &str) -> Result<Self, CipherError> {
        let key_hex = key_hex.trim();
        if key_hex.is_empty() {
            return Err(CipherError::KeyConfig("encryption key is not set".into()));
        }
        if key_hex.len() != AES_KEY_LENGTH * 2 {
            return Err(CipherError::KeyConfig(format!(
                "expected {} hex characters, got {}",
                AES_KEY_LENGTH * 2,
                key_hex.len()
            )));
        }
        let key = Zeroizing::new(
            hex::decode(key_hex).map_err(|e| CipherError::KeyConfig(e.to_string()))?,
        );
        Self::new(&key)
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob, CipherError> {
        let nonce = generate_nonce()?;
        let mut sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

        // aes-gcm appends the tag to the ciphertext
        let auth_tag = sealed.split_off(sealed.len() - AES_GCM_TAG_LENGTH);
        Ok(EncryptedBlob {
            ciphertext: sealed,
            auth_tag,
            nonce: nonce.to_vec(),
        })
    }

    /// Decrypt and authenticate a blob.
    ///
    /// Any tampering with ciphertext, tag or nonce yields
    /// `CipherError::IntegrityFailure` and no plaintext.
    pub fn decrypt(&self, blob: &EncryptedBlob) -> Result<Vec<u8>, CipherError> {
        if blob.nonce.len() != AES_GCM_NONCE_LENGTH {
            return Err(CipherError::MalformedBlob(format!(
                "nonce must be {} bytes, got {}",
                AES_GCM_NONCE_LENGTH,
                blob.nonce.len()
            )));
        }
        if blob.auth_tag.len() != AES_GCM_TAG_LENGTH {
            return Err(CipherError::MalformedBlob(format!(
                "tag must be {} bytes, got {}",
                AES_GCM_TAG_LENGTH,
                blob.auth_tag.len()
            )));
        }

        let mut sealed = Vec::with_capacity(blob.ciphertext.len() + AES_GCM_TAG_LENGTH);
        sealed.extend_from_slice(&blob.ciphertext);
        sealed.extend_from_slice(&blob.auth_tag);

        self.cipher
            .decrypt(Nonce::from_slice(&blob.nonce), sealed.as_slice())
            .map_err(|_| CipherError::IntegrityFailure)
    }
}

impl EncryptedBlob {
    /// `hex(ciphertext):hex(tag)`.
    pub fn encode_body(&self) -> String {
        format!(
            "{}{}{}",
            hex::encode(&self.ciphertext),
            BODY_SEPARATOR,
            hex::encode(&self.auth_tag)
        )
    }

    pub fn encode_nonce(&self) -> String {
        hex::encode(&self.nonce)
    }

    /// Parse the stored body and nonce columns.
    pub fn decode(body: &str, nonce_hex: &str) -> Result<Self, CipherError> {
        let (ct_hex, tag_hex) = body.rsplit_once(BODY_SEPARATOR).ok_or_else(|| {
            CipherError::MalformedBlob("expected \"ciphertext:authTag\"".into())
        })?;
        if tag_hex.is_empty() {
            return Err(CipherError::MalformedBlob(
                "expected \"ciphertext:authTag\"".into(),
            ));
        }

        let ciphertext =
            hex::decode(ct_hex).map_err(|e| CipherError::MalformedBlob(format!("ciphertext: {e}")))?;
        let auth_tag =
            hex::decode(tag_hex).map_err(|e| CipherError::MalformedBlob(format!("tag: {e}")))?;
        let nonce =
            hex::decode(nonce_hex).map_err(|e| CipherError::MalformedBlob(format!("nonce: {e}")))?;

        Ok(Self {
            ciphertext,
            auth_tag,
            nonce,
        })
    }
}
