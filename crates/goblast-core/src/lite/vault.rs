//! AES-256-GCM credential vault (C1).
//!
//! Storage encoding: `base64(nonce || ciphertext || tag)`. The nonce is 12 random bytes,
//! generated fresh per encryption and prepended to the sealed output, matching the
//! original system's `Seal(nonce, nonce, plaintext, nil)` layout.

use crate::{Error, Result, Vault};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct AesGcmVault {
    cipher: Aes256Gcm,
}

impl AesGcmVault {
    /// `key` must be exactly 32 bytes (AES-256).
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(Error::msg(format!(
                "encryption key must be 32 bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        Ok(Self { cipher })
    }
}

impl Vault for AesGcmVault {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| Error::msg("encrypt token"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    fn decrypt(&self, encoded: &str) -> Result<String> {
        let sealed = BASE64
            .decode(encoded)
            .map_err(|_| Error::msg("decode base64 token"))?;
        if sealed.len() < NONCE_LEN {
            return Err(Error::msg("ciphertext shorter than nonce"));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| Error::msg("decrypt token"))?;
        String::from_utf8(plaintext).map_err(|_| Error::msg("decrypted token is not utf-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> Vec<u8> {
        (0u8..32).collect()
    }

    #[test]
    fn round_trips_plaintext() {
        let vault = AesGcmVault::new(&key()).unwrap();
        let encoded = vault.encrypt("bot-token-12345").unwrap();
        assert_eq!(vault.decrypt(&encoded).unwrap(), "bot-token-12345");
    }

    #[test]
    fn rejects_short_key() {
        assert!(AesGcmVault::new(b"too-short").is_err());
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        let vault = AesGcmVault::new(&key()).unwrap();
        assert!(vault.decrypt("").is_err());
        assert!(vault.decrypt(&BASE64.encode(b"short")).is_err());
    }

    #[test]
    fn distinct_encryptions_use_distinct_nonces() {
        let vault = AesGcmVault::new(&key()).unwrap();
        let a = vault.encrypt("same-plaintext").unwrap();
        let b = vault.encrypt("same-plaintext").unwrap();
        assert_ne!(a, b);
    }
}
