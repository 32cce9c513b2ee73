//! Symmetric encryption of stored access tokens.
//!
//! Tokens are sealed with ChaCha20-Poly1305 under a 32-byte key and stored as
//! base64 of `nonce || ciphertext`.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};
use rand::{RngCore, rngs::OsRng};
use thiserror::Error;

use crate::EngineError;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("encryption key must be base64 of 32 bytes or a 32-byte ascii value")]
    InvalidKey,
    #[error("ciphertext is not valid base64")]
    Encoding,
    #[error("ciphertext is too short")]
    Truncated,
    #[error("ciphertext failed authentication")]
    Authentication,
    #[error("plaintext is not valid utf-8")]
    Utf8,
}

impl From<CipherError> for EngineError {
    fn from(value: CipherError) -> Self {
        EngineError::Credential(value.to_string())
    }
}

#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    #[must_use]
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Accepts a base64-encoded key or a raw 32-character ascii key.
    pub fn from_config(raw: &str) -> Result<Self, CipherError> {
        let trimmed = raw.trim();
        let decoded = match BASE64.decode(trimmed) {
            Ok(bytes) if bytes.len() == 32 => bytes,
            _ if trimmed.len() == 32 => trimmed.as_bytes().to_vec(),
            _ => return Err(CipherError::InvalidKey),
        };
        let key: [u8; 32] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::InvalidKey)?;
        Ok(Self::new(key))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CipherError::Authentication)?;
        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(BASE64.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CipherError> {
        let raw = BASE64.decode(encoded.trim()).map_err(|_| CipherError::Encoding)?;
        if raw.len() <= NONCE_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::Authentication)?;
        String::from_utf8(plain).map_err(|_| CipherError::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seals_and_opens() {
        let cipher = TokenCipher::new([7u8; 32]);
        let sealed = cipher.encrypt("access-sandbox-123").unwrap();
        assert_ne!(sealed, "access-sandbox-123");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "access-sandbox-123");
    }

    #[test]
    fn nonces_differ_between_calls() {
        let cipher = TokenCipher::new([7u8; 32]);
        assert_ne!(cipher.encrypt("t").unwrap(), cipher.encrypt("t").unwrap());
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = TokenCipher::new([7u8; 32]).encrypt("token").unwrap();
        assert_eq!(
            TokenCipher::new([8u8; 32]).decrypt(&sealed).unwrap_err(),
            CipherError::Authentication
        );
    }

    #[test]
    fn garbage_is_rejected() {
        let cipher = TokenCipher::new([7u8; 32]);
        assert_eq!(cipher.decrypt("not base64!").unwrap_err(), CipherError::Encoding);
        assert_eq!(cipher.decrypt("AAAA").unwrap_err(), CipherError::Truncated);
    }

    #[test]
    fn key_from_config() {
        let key = BASE64.encode([1u8; 32]);
        assert!(TokenCipher::from_config(&key).is_ok());
        assert!(TokenCipher::from_config("0123456789abcdef0123456789abcdef").is_ok());
        assert_eq!(
            TokenCipher::from_config("short").unwrap_err(),
            CipherError::InvalidKey
        );
    }
}
