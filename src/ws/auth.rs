//! Identity token verification for WebSocket upgrades
//!
//! The platform API mints HMAC-SHA256-signed tokens (JWT layout) carrying
//! the external user id and optional profile fields. A valid token pins
//! the connection's identity; the `player:join` payload cannot then claim
//! a different user id. Connections without a token are anonymous unless
//! `REQUIRE_AUTH` is set.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by an identity token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// External user id from the platform API
    pub sub: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: u64,
}

/// Verify a token and extract its claims
pub fn verify_identity_token(token: &str, secret: &str) -> Result<IdentityClaims, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::InvalidToken);
    }

    let header_b64 = parts[0];
    let payload_b64 = parts[1];
    let signature_b64 = parts[2];

    // Verify signature (HMAC-SHA256)
    let message = format!("{}.{}", header_b64, payload_b64);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(message.as_bytes());

    let expected_signature = mac.finalize().into_bytes();
    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    if expected_signature.as_slice() != provided_signature.as_slice() {
        return Err(AuthError::InvalidToken);
    }

    // Decode payload
    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    let claims: IdentityClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    // Check expiration
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    if claims.exp < now {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,
}
