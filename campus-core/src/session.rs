//! Opaque refresh tokens for long-lived sessions.
//!
//! Access tokens are short-lived JWTs; refresh tokens are random opaque
//! strings. Only a SHA-256 digest of the refresh token is ever persisted,
//! so a leaked database does not leak usable tokens.

use openssl::hash::{Hasher, MessageDigest};
use openssl::rand::rand_bytes;

use crate::Error;

const REFRESH_TOKEN_BYTES: usize = 32;

/// Default refresh token lifetime, in days. Sessions older than this are
/// rejected on refresh and swept by the server.
pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 30;

/// A freshly generated refresh token. `token` is handed to the client
/// once and never stored; `digest` is what the server persists.
pub struct RefreshToken {
    pub token: String,
    pub digest: String,
}

impl RefreshToken {
    pub fn generate() -> Result<Self, Error> {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        rand_bytes(&mut bytes)?;
        let token = base64::encode_config(bytes, base64::URL_SAFE_NO_PAD);
        let digest = digest(&token)?;
        Ok(Self { token, digest })
    }
}

/// Computes the persistent digest for a refresh token presented by a
/// client, for lookup against the stored value.
pub fn digest(token: &str) -> Result<String, Error> {
    let mut hasher = Hasher::new(MessageDigest::sha256())?;
    hasher.update(token.as_bytes())?;
    let digest_bytes = hasher.finish()?;
    Ok(base64::encode_config(&digest_bytes, base64::URL_SAFE_NO_PAD))
}
