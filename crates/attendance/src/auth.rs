//! Signed-in identity.
//!
//! The backend's auth service owns sign-in; this crate only needs to know
//! which user is signed in and the access token to send with each call.
//! [`AuthContext`] is a shared, watchable slot for that identity so the
//! generator and reconciler always read the current user at call time.

use crate::errors::AttendanceError;
use chrono::Utc;
use common::claims::{peek_claims, ClaimsError};
use common::secret::SecretString;
use common::types::UserId;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// An authenticated user and their access token.
#[derive(Clone)]
pub struct Identity {
    user_id: UserId,
    access_token: SecretString,
    /// Token expiry (Unix seconds), when known from its claims.
    expires_at: Option<i64>,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Identity {
    /// Identity with no known token expiry.
    #[must_use]
    pub fn new(user_id: UserId, access_token: SecretString) -> Self {
        Self {
            user_id,
            access_token,
            expires_at: None,
        }
    }

    /// Build an identity from the claims of a backend access token.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError` when the token is malformed or its subject is
    /// not a user id.
    pub fn from_access_token(access_token: SecretString) -> Result<Self, ClaimsError> {
        use common::secret::ExposeSecret;

        let claims = peek_claims(access_token.expose_secret())?;
        let user_id = claims.user_id()?;
        Ok(Self {
            user_id,
            access_token,
            expires_at: Some(claims.exp),
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    /// Whether the access token has expired at `now` (Unix seconds).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Shared slot holding the current identity, if any.
///
/// Cloning shares the slot.
#[derive(Clone, Debug)]
pub struct AuthContext {
    current: Arc<watch::Sender<Option<Identity>>>,
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl AuthContext {
    /// Context with nobody signed in.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            current: Arc::new(watch::Sender::new(None)),
        }
    }

    /// Context with `identity` already signed in.
    #[must_use]
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            current: Arc::new(watch::Sender::new(Some(identity))),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        tracing::debug!(target: "attendance.auth", user_id = %identity.user_id(), "Signed in");
        self.current.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        tracing::debug!(target: "attendance.auth", "Signed out");
        self.current.send_replace(None);
    }

    /// Current identity, treating an expired access token as signed out.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        let now = Utc::now().timestamp();
        self.current
            .borrow()
            .as_ref()
            .filter(|identity| !identity.is_expired_at(now))
            .cloned()
    }

    /// Current identity or `NotAuthenticated`.
    ///
    /// # Errors
    ///
    /// Returns `AttendanceError::NotAuthenticated` when nobody is signed in
    /// or the access token has expired.
    pub fn require(&self) -> Result<Identity, AttendanceError> {
        self.current().ok_or(AttendanceError::NotAuthenticated)
    }

    /// Watch sign-in changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}
