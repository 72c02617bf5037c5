//! JWT signing keys and typed claim kinds.
//!
//! Every token kind implements [`ScopedClaims`], which fixes its audience and
//! issuer. `TokenKeys::verify::<C>` only accepts tokens carrying `C`'s
//! audience and issuer, so a playback token never verifies as a session token
//! and vice versa, even though both share one HS256 secret.

use std::path::{Path, PathBuf};

use jsonwebtoken::errors::Error as JwtError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

/// A claim set bound to one audience/issuer pair.
pub trait ScopedClaims: Serialize + DeserializeOwned {
    const AUDIENCE: &'static str;
    const ISSUER: &'static str;
}

/// HS256 signing and verification keys derived from the process-wide secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a claim set (HS256).
    pub fn sign<C: ScopedClaims>(&self, claims: &C) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    /// Verify signature, expiry (no leeway), audience, and issuer for kind `C`.
    pub fn verify<C: ScopedClaims>(&self, token: &str) -> Result<C, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(&[C::AUDIENCE]);
        validation.set_issuer(&[C::ISSUER]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        decode::<C>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

/// Resolve the signing secret: `JWT_SECRET` → `AUTH_SECRET` → persisted file.
///
/// `lookup` reads a variable by name; binaries pass `std::env::var`.
pub fn resolve_signing_secret<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    for name in ["JWT_SECRET", "AUTH_SECRET"] {
        if let Some(secret) = lookup(name)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    load_or_create_secret(&signing_secret_path())
}

/// Read a secret from `path`, generating and persisting one if absent.
pub fn load_or_create_secret(path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(path = %parent.display(), error = %e, "could not create signing secret directory");
    }
    match std::fs::write(path, &secret) {
        Ok(()) => info!(path = %path.display(), "generated new signing secret"),
        Err(e) => warn!(
            path = %path.display(),
            error = %e,
            "could not persist signing secret; tokens will not survive a restart"
        ),
    }
    secret
}

/// Path to the persisted signing secret file.
fn signing_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tollgate")
        .join("signing-secret")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct AlphaClaims {
        sub: String,
        aud: String,
        iss: String,
        exp: i64,
    }

    impl ScopedClaims for AlphaClaims {
        const AUDIENCE: &'static str = "alpha";
        const ISSUER: &'static str = "test";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct BetaClaims {
        sub: String,
        aud: String,
        iss: String,
        exp: i64,
    }

    impl ScopedClaims for BetaClaims {
        const AUDIENCE: &'static str = "beta";
        const ISSUER: &'static str = "test";
    }

    fn alpha(exp_offset_secs: i64) -> AlphaClaims {
        AlphaClaims {
            sub: "device".into(),
            aud: AlphaClaims::AUDIENCE.into(),
            iss: AlphaClaims::ISSUER.into(),
            exp: (Utc::now() + Duration::seconds(exp_offset_secs)).timestamp(),
        }
    }

    #[test]
    fn sign_and_verify_same_kind() {
        let keys = TokenKeys::from_secret(b"secret");
        let token = keys.sign(&alpha(60)).unwrap();
        let claims = keys.verify::<AlphaClaims>(&token).unwrap();
        assert_eq!(claims.sub, "device");
    }

    #[test]
    fn other_kind_is_rejected() {
        let keys = TokenKeys::from_secret(b"secret");
        let token = keys.sign(&alpha(60)).unwrap();
        assert!(keys.verify::<BetaClaims>(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected_without_leeway() {
        let keys = TokenKeys::from_secret(b"secret");
        let token = keys.sign(&alpha(-5)).unwrap();
        assert!(keys.verify::<AlphaClaims>(&token).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenKeys::from_secret(b"one").sign(&alpha(60)).unwrap();
        assert!(
            TokenKeys::from_secret(b"two")
                .verify::<AlphaClaims>(&token)
                .is_err()
        );
    }

    #[test]
    fn env_secret_wins_over_file() {
        let secret = resolve_signing_secret(|name| match name {
            "AUTH_SECRET" => Some("from-auth-secret".into()),
            _ => None,
        });
        assert_eq!(secret, "from-auth-secret");
    }

    #[test]
    fn unwritable_path_still_yields_a_secret() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("signing-secret");

        let first = load_or_create_secret(&path);
        assert_eq!(first.len(), 64);
        assert!(!path.exists());
        // Nothing persisted, so the next call generates a fresh secret.
        assert_ne!(load_or_create_secret(&path), first);
    }

    #[test]
    fn persisted_secret_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("signing-secret");
        let first = load_or_create_secret(&path);
        let second = load_or_create_secret(&path);
        assert_eq!(first.len(), 64);
        assert_eq!(first, second);
    }
}
