//! Device authentication and token signing.
//!
//! Session tokens are the general bearer credential a device receives after
//! authenticating with its uuid + code. Token keys and the claims trait live
//! in [`keys`]; playback tokens reuse them under a different audience.

pub mod keys;
pub mod session;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::store::StoreError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Device not registered")]
    NotRegistered,

    #[error("Device not active")]
    NotActive,

    #[error("Device access expired")]
    Expired,

    #[error("Device uuid already bound to an approved device")]
    UuidInUse,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Compare two secrets in constant time.
///
/// Both sides are hashed first so the comparison runs over equal-length
/// digests regardless of input length.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.as_slice().ct_eq(b.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_match_compares_content() {
        assert!(secrets_match("admin-key", "admin-key"));
        assert!(!secrets_match("admin-key", "admin-kez"));
        assert!(!secrets_match("", "admin-key"));
    }

    #[test]
    fn secrets_of_different_length_never_match() {
        assert!(!secrets_match("admin-key", "admin-key-and-more"));
        assert!(!secrets_match("admin-key-and-more", "admin-key"));
        assert!(secrets_match("", ""));
    }
}
