//! AES-256-GCM vault for secrets stored at rest.
//!
//! Seals upstream usernames/passwords and adult PINs. Each call draws a fresh
//! random 12-byte nonce. Sealed output is `nonce.tag.ciphertext`, each part
//! standard base64, so it fits in a TEXT column as an opaque string.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use thiserror::Error;

/// AES-256 key size (32 bytes).
pub const KEY_SIZE: usize = 32;
/// Nonce size for AES-256-GCM (12 bytes).
const NONCE_SIZE: usize = 12;
/// GCM tag size (16 bytes).
const TAG_SIZE: usize = 16;
/// Separator between the packed parts.
const DELIMITER: char = '.';

/// Vault errors.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Invalid vault key: {0}")]
    InvalidKey(String),

    #[error("Malformed sealed payload")]
    Malformed,

    #[error("Sealed payload failed authentication")]
    AuthenticationFailed,

    #[error("Encryption failed: {0}")]
    Encryption(String),
}

/// Symmetric vault holding the process-wide 256-bit key.
#[derive(Clone)]
pub struct Vault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").finish_non_exhaustive()
    }
}

impl Vault {
    /// Build a vault from a base64-encoded 32-byte key (`ENC_KEY_BASE64`).
    pub fn from_base64_key(encoded: &str) -> Result<Self, VaultError> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|e| VaultError::InvalidKey(format!("base64 decode: {e}")))?;
        Self::from_key_bytes(&key)
    }

    /// Build a vault from raw key bytes. The key must be exactly 32 bytes.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, VaultError> {
        if key.len() != KEY_SIZE {
            return Err(VaultError::InvalidKey(format!(
                "expected {KEY_SIZE} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| VaultError::InvalidKey(format!("key init: {e}")))?;
        Ok(Self { cipher })
    }

    /// Generate a fresh random key, base64-encoded.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut key);
        STANDARD.encode(key)
    }

    /// Seal a plaintext string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // aes-gcm appends the tag to the ciphertext
        let mut ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;
        let tag = ciphertext.split_off(ciphertext.len() - TAG_SIZE);

        Ok(format!(
            "{}{DELIMITER}{}{DELIMITER}{}",
            STANDARD.encode(nonce_bytes),
            STANDARD.encode(tag),
            STANDARD.encode(ciphertext)
        ))
    }

    /// Open a sealed payload produced by [`Vault::encrypt`].
    ///
    /// Fails with `Malformed` only when the payload does not split into a
    /// nonce, a tag and a ciphertext part. Once split, any damaged part
    /// (bad base64, wrong length, failed tag) is `AuthenticationFailed`.
    /// Never returns partial plaintext.
    pub fn decrypt(&self, sealed: &str) -> Result<String, VaultError> {
        let parts: Vec<&str> = sealed.split(DELIMITER).collect();
        let [nonce_b64, tag_b64, ciphertext_b64] = parts.as_slice() else {
            return Err(VaultError::Malformed);
        };
        // Empty plaintext seals to an empty ciphertext part; nonce and tag never are.
        if nonce_b64.is_empty() || tag_b64.is_empty() {
            return Err(VaultError::Malformed);
        }

        let nonce_bytes = decode_part(nonce_b64)?;
        let tag = decode_part(tag_b64)?;
        let mut combined = decode_part(ciphertext_b64)?;
        if nonce_bytes.len() != NONCE_SIZE || tag.len() != TAG_SIZE {
            return Err(VaultError::AuthenticationFailed);
        }
        combined.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), combined.as_slice())
            .map_err(|_| VaultError::AuthenticationFailed)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::AuthenticationFailed)
    }
}

fn decode_part(part: &str) -> Result<Vec<u8>, VaultError> {
    STANDARD
        .decode(part)
        .map_err(|_| VaultError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> Vault {
        Vault::from_key_bytes(&[7u8; KEY_SIZE]).unwrap()
    }

    /// Flip one bit in the decoded bytes of part `index`, keeping valid base64.
    fn tamper(sealed: &str, index: usize) -> String {
        let mut parts: Vec<String> = sealed.split('.').map(str::to_string).collect();
        let mut bytes = STANDARD.decode(&parts[index]).unwrap();
        bytes[0] ^= 0x01;
        parts[index] = STANDARD.encode(bytes);
        parts.join(".")
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let v = vault();
        for plaintext in ["upstream-user", "p@ss.word.with.dots", "", "ünïcødé 🔑"] {
            let sealed = v.encrypt(plaintext).unwrap();
            assert_eq!(v.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn sealed_payload_has_three_parts() {
        let sealed = vault().encrypt("secret").unwrap();
        assert_eq!(sealed.split('.').count(), 3);
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let v = vault();
        let a = v.encrypt("same").unwrap();
        let b = v.encrypt("same").unwrap();
        assert_ne!(a, b);
        assert_ne!(a.split('.').next(), b.split('.').next());
    }

    #[test]
    fn tampering_any_part_fails_authentication() {
        let v = vault();
        let sealed = v.encrypt("sk-live-123").unwrap();
        for index in 0..3 {
            let tampered = tamper(&sealed, index);
            assert!(matches!(
                v.decrypt(&tampered),
                Err(VaultError::AuthenticationFailed)
            ));
        }
    }

    #[test]
    fn replacing_any_character_fails_authentication() {
        let v = vault();
        let sealed = v.encrypt("sk-live-123").unwrap();
        for (index, c) in sealed.char_indices() {
            if c == '.' {
                continue;
            }
            let replacement = if c == 'B' { 'C' } else { 'B' };
            let mut tampered = sealed.clone();
            tampered.replace_range(index..index + 1, &replacement.to_string());
            assert!(
                matches!(v.decrypt(&tampered), Err(VaultError::AuthenticationFailed)),
                "expected AuthenticationFailed with position {index} replaced"
            );
        }
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = vault().encrypt("secret").unwrap();
        let other = Vault::from_key_bytes(&[9u8; KEY_SIZE]).unwrap();
        assert!(matches!(
            other.decrypt(&sealed),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let v = vault();
        let sealed = v.encrypt("secret").unwrap();
        let (nonce, rest) = sealed.split_once('.').unwrap();
        let ciphertext = rest.split_once('.').unwrap().1;
        let cases = [
            String::new(),
            "onlyonepart".to_string(),
            format!("{nonce}.{rest}.extra"),
            format!(".{rest}"),
            format!("{nonce}..{ciphertext}"),
        ];
        for case in cases {
            assert!(
                matches!(v.decrypt(&case), Err(VaultError::Malformed)),
                "expected Malformed for {case:?}"
            );
        }
    }

    #[test]
    fn damaged_parts_fail_authentication() {
        let v = vault();
        let sealed = v.encrypt("secret").unwrap();
        let (nonce, rest) = sealed.split_once('.').unwrap();
        for case in [
            format!("{nonce}.!!notbase64!!.AAAA"),
            format!("AAAA.{rest}"),
        ] {
            assert!(
                matches!(v.decrypt(&case), Err(VaultError::AuthenticationFailed)),
                "expected AuthenticationFailed for {case:?}"
            );
        }
    }

    #[test]
    fn key_must_be_32_bytes() {
        assert!(matches!(
            Vault::from_key_bytes(&[0u8; 16]),
            Err(VaultError::InvalidKey(_))
        ));
        assert!(matches!(
            Vault::from_base64_key("not base64!"),
            Err(VaultError::InvalidKey(_))
        ));
        assert!(Vault::from_base64_key(&Vault::generate_key()).is_ok());
    }
}
