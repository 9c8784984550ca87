//! Builder patterns for test access tokens and identities
//!
//! Tokens are unsigned: the client only peeks at their claims.

use attendance::{AuthContext, Identity};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use common::secret::SecretString;
use common::types::UserId;
use serde_json::json;

/// Builder for test access tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestAccessTokenBuilder::new()
///     .for_user(TEST_USER_ALICE)
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestAccessTokenBuilder {
    sub: String,
    exp: i64,
    email: Option<String>,
}

impl TestAccessTokenBuilder {
    /// Create a new token builder valid for one hour
    pub fn new() -> Self {
        Self {
            sub: UserId(uuid::Uuid::from_u128(100)).to_string(),
            exp: (Utc::now() + Duration::seconds(3600)).timestamp(),
            email: None,
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.sub = user_id.to_string();
        self
    }

    /// Set a raw subject (e.g. a non-UUID one)
    pub fn with_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Build the unsigned JWT as a secret
    pub fn build(self) -> SecretString {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            json!({
                "sub": self.sub,
                "exp": self.exp,
                "email": self.email,
            })
            .to_string(),
        );
        SecretString::from(format!("{header}.{payload}.test-signature"))
    }

    /// Build and parse into an [`Identity`]
    pub fn build_identity(self) -> Identity {
        Identity::from_access_token(self.build()).expect("test token should parse")
    }
}

impl Default for TestAccessTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity for `user_id` with a token valid for one hour.
pub fn identity_for(user_id: UserId) -> Identity {
    TestAccessTokenBuilder::new()
        .for_user(user_id)
        .build_identity()
}

/// Auth context with `user_id` signed in.
pub fn signed_in_as(user_id: UserId) -> AuthContext {
    AuthContext::signed_in(identity_for(user_id))
}
