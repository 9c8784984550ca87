//! Secret types for values that must never reach a log line.
//!
//! Re-exports [`secrecy`] so every crate in the workspace wraps user access
//! tokens and the backend anon key the same way. `SecretString` redacts its
//! `Debug` output, so structs that derive `Debug` stay safe to trace.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct BackendCredentials {
//!     base_url: String,
//!     anon_key: SecretString,
//! }
//!
//! let creds = BackendCredentials {
//!     base_url: "https://project.example.co".to_string(),
//!     anon_key: SecretString::from("anon-key"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("anon-key"));
//! assert_eq!(creds.anon_key.expose_secret(), "anon-key");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("eyJhbGciOi.access.token");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("eyJhbGciOi"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("anon-key-123");
        assert_eq!(secret.expose_secret(), "anon-key-123");
    }

    #[test]
    fn test_deserialized_session_payload_stays_redacted() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct SignedInSession {
            user_id: String,
            access_token: SecretString,
        }

        let json = r#"{"user_id": "u-1", "access_token": "tok-value"}"#;
        let session: SignedInSession = serde_json::from_str(json).expect("deserialize");

        assert_eq!(session.access_token.expose_secret(), "tok-value");
        let debug = format!("{session:?}");
        assert!(debug.contains("u-1"));
        assert!(!debug.contains("tok-value"));
    }
}
