//! Access-token claim peeking.
//!
//! The backend issues the signed-in user a JWT access token. The client never
//! verifies its signature (the backend does that on every RPC); it only reads
//! the `sub` and `exp` claims so it knows *who* is signed in and whether the
//! token is already stale before attempting a call.
//!
//! - Tokens are size-checked before any decoding
//! - The `sub` field is redacted in Debug output
//! - Error messages are generic; details go to debug logs

use crate::types::UserId;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Maximum accepted access-token size in bytes (8KB).
pub const MAX_ACCESS_TOKEN_SIZE_BYTES: usize = 8192;

/// Errors raised while reading access-token claims.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not a three-part JWT with a JSON payload.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// The `sub` claim is missing or not a UUID.
    #[error("The access token is invalid or expired")]
    InvalidSubject,
}

/// Claims the client cares about.
#[derive(Clone, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (backend user id) - redacted in Debug output.
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Optional email claim.
    #[serde(default)]
    pub email: Option<String>,
}

impl fmt::Debug for AccessTokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenClaims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AccessTokenClaims {
    /// Parse the subject as a [`UserId`].
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::InvalidSubject` when `sub` is not a UUID.
    pub fn user_id(&self) -> Result<UserId, ClaimsError> {
        self.sub.parse().map_err(|_| ClaimsError::InvalidSubject)
    }

    /// Whether the token has expired at `now` (Unix epoch seconds).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}

/// Read the claims of a JWT access token without verifying its signature.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds `MAX_ACCESS_TOKEN_SIZE_BYTES`
/// - `MalformedToken` - wrong segment count, bad base64, or bad JSON
pub fn peek_claims(token: &str) -> Result<AccessTokenClaims, ClaimsError> {
    if token.len() > MAX_ACCESS_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "common.claims",
            token_size = token.len(),
            max_size = MAX_ACCESS_TOKEN_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(ClaimsError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.claims", "Token rejected: invalid JWT format");
        return Err(ClaimsError::MalformedToken);
    };

    let payload_bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|e| {
        tracing::debug!(target: "common.claims", error = %e, "Failed to decode JWT payload base64");
        ClaimsError::MalformedToken
    })?;

    serde_json::from_slice(&payload_bytes).map_err(|e| {
        tracing::debug!(target: "common.claims", error = %e, "Failed to parse JWT payload JSON");
        ClaimsError::MalformedToken
    })
}
