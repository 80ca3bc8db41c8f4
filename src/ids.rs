//! Short URL-safe paste ids.

use crate::error::CipherError;

/// Default id length (8 symbols, 48 bits).
pub const DEFAULT_ID_LENGTH: usize = 8;

/// 64 URL-safe symbols, so each random byte maps to one symbol without bias.
const ALPHABET: &[u8; 64] = b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

pub fn generate_id(length: usize) -> Result<String, CipherError> {
    let mut bytes = vec![0u8; length];
    getrandom::getrandom(&mut bytes).map_err(|e| CipherError::RngFailed(e.to_string()))?;
    Ok(bytes
        .iter()
        .map(|b| ALPHABET[(b & 63) as usize] as char)
        .collect())
}
