//! Session code codec.
//!
//! A session code is the text rendered into the QR image:
//!
//! ```text
//! ATTEND-<class-slug>-<nonce>-<unix-ms>
//! ```
//!
//! - `class-slug`: the trimmed class name with each whitespace run replaced
//!   by a single `-`; 1..=100 chars of `[A-Za-z0-9_-]`
//! - `nonce`: exactly 6 ASCII alphanumerics, so two sessions created in the
//!   same millisecond still get distinct codes
//! - `unix-ms`: issue time in milliseconds, digits only
//!
//! The slug may itself contain `-`, so decoding splits the last two fields
//! off from the right. Anything that does not decode is rejected locally and
//! never reaches the backend.

use chrono::{DateTime, TimeZone, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Literal prefix every session code starts with.
pub const CODE_PREFIX: &str = "ATTEND-";

/// Maximum accepted code length in bytes. Longer scans are rejected before parsing.
pub const MAX_CODE_LENGTH: usize = 500;

/// Maximum class slug length in characters.
pub const MAX_CLASS_SLUG_LENGTH: usize = 100;

/// Nonce length in characters.
pub const NONCE_LENGTH: usize = 6;

/// Why a scanned or issued code is not a session code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("code is empty")]
    Empty,

    #[error("code is {len} bytes, maximum is {max}")]
    TooLong { len: usize, max: usize },

    #[error("code does not start with {CODE_PREFIX}")]
    MissingPrefix,

    #[error("code is missing the {0} field")]
    MissingField(&'static str),

    #[error("class slug is empty, too long, or contains disallowed characters")]
    InvalidClassSlug,

    #[error("nonce must be {NONCE_LENGTH} alphanumeric characters")]
    InvalidNonce,

    #[error("timestamp must be an unsigned integer")]
    InvalidTimestamp,
}

/// A validated session code string.
///
/// Only constructed through [`SessionToken::encode`] or by parsing, so any
/// value of this type carries its decoded parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionCode {
    raw: String,
    token: SessionToken,
}

impl SessionCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Decoded parts of this code.
    #[must_use]
    pub fn token(&self) -> &SessionToken {
        &self.token
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for SessionCode {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = decode(s)?;
        Ok(Self {
            raw: s.to_string(),
            token,
        })
    }
}

impl TryFrom<String> for SessionCode {
    type Error = FormatError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let token = decode(&raw)?;
        Ok(Self { raw, token })
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> Self {
        code.raw
    }
}

/// Decoded parts of a session code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken {
    class_slug: String,
    nonce: String,
    issued_at_ms: u64,
}

impl SessionToken {
    /// Build a token for a fresh session with a random nonce.
    ///
    /// # Errors
    ///
    /// Returns `FormatError::InvalidClassSlug` when the class name does not
    /// normalize to a valid slug.
    pub fn issue(class_name: &str, issued_at: DateTime<Utc>) -> Result<Self, FormatError> {
        let issued_at_ms =
            u64::try_from(issued_at.timestamp_millis()).map_err(|_| FormatError::InvalidTimestamp)?;
        Self::new(class_name, &generate_nonce(), issued_at_ms)
    }

    /// Build a token from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClassSlug` or `InvalidNonce` when a part is not encodable.
    pub fn new(class_name: &str, nonce: &str, issued_at_ms: u64) -> Result<Self, FormatError> {
        let class_slug = slugify(class_name)?;
        if !is_valid_nonce(nonce) {
            return Err(FormatError::InvalidNonce);
        }
        Ok(Self {
            class_slug,
            nonce: nonce.to_string(),
            issued_at_ms,
        })
    }

    /// Render the token as a session code.
    ///
    /// # Errors
    ///
    /// Returns `FormatError::TooLong` if the rendered code would exceed
    /// [`MAX_CODE_LENGTH`].
    pub fn encode(&self) -> Result<SessionCode, FormatError> {
        let code = format!(
            "{CODE_PREFIX}{}-{}-{}",
            self.class_slug, self.nonce, self.issued_at_ms
        );
        if code.len() > MAX_CODE_LENGTH {
            return Err(FormatError::TooLong {
                len: code.len(),
                max: MAX_CODE_LENGTH,
            });
        }
        Ok(SessionCode {
            raw: code,
            token: self.clone(),
        })
    }

    /// Normalized class slug, e.g. `Data-Structures`.
    #[must_use]
    pub fn class_slug(&self) -> &str {
        &self.class_slug
    }

    /// Class name for display, with hyphens turned back into spaces.
    ///
    /// Lossy: a class name that originally contained `-` displays with a space.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.class_slug.replace('-', " ")
    }

    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    #[must_use]
    pub fn issued_at_ms(&self) -> u64 {
        self.issued_at_ms
    }

    /// Issue time, if the millisecond value is a representable instant.
    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        let ms = i64::try_from(self.issued_at_ms).ok()?;
        Utc.timestamp_millis_opt(ms).single()
    }
}

/// Encode a class name into a session code.
///
/// # Errors
///
/// See [`SessionToken::new`] and [`SessionToken::encode`].
pub fn encode(class_name: &str, nonce: &str, issued_at_ms: u64) -> Result<SessionCode, FormatError> {
    SessionToken::new(class_name, nonce, issued_at_ms)?.encode()
}

/// Decode a scanned string into its parts.
///
/// # Errors
///
/// Returns a [`FormatError`] describing the first rule the input breaks.
pub fn decode(raw: &str) -> Result<SessionToken, FormatError> {
    if raw.is_empty() {
        return Err(FormatError::Empty);
    }
    if raw.len() > MAX_CODE_LENGTH {
        return Err(FormatError::TooLong {
            len: raw.len(),
            max: MAX_CODE_LENGTH,
        });
    }

    let rest = raw
        .strip_prefix(CODE_PREFIX)
        .ok_or(FormatError::MissingPrefix)?;

    let mut fields = rest.rsplitn(3, '-');
    let timestamp = fields.next().ok_or(FormatError::MissingField("timestamp"))?;
    let nonce = fields.next().ok_or(FormatError::MissingField("nonce"))?;
    let class_slug = fields.next().ok_or(FormatError::MissingField("class"))?;

    if !is_valid_slug(class_slug) {
        return Err(FormatError::InvalidClassSlug);
    }
    if !is_valid_nonce(nonce) {
        return Err(FormatError::InvalidNonce);
    }
    if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FormatError::InvalidTimestamp);
    }
    let issued_at_ms = timestamp
        .parse::<u64>()
        .map_err(|_| FormatError::InvalidTimestamp)?;

    Ok(SessionToken {
        class_slug: class_slug.to_string(),
        nonce: nonce.to_string(),
        issued_at_ms,
    })
}

/// Generate a random alphanumeric nonce.
#[must_use]
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

fn slugify(class_name: &str) -> Result<String, FormatError> {
    let slug = class_name.split_whitespace().collect::<Vec<_>>().join("-");
    if is_valid_slug(&slug) {
        Ok(slug)
    } else {
        tracing::debug!(
            target: "attendance.codec",
            class_name_len = class_name.len(),
            "Class name does not normalize to a valid slug"
        );
        Err(FormatError::InvalidClassSlug)
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.chars().count() <= MAX_CLASS_SLUG_LENGTH
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_valid_nonce(nonce: &str) -> bool {
    nonce.len() == NONCE_LENGTH && nonce.bytes().all(|b| b.is_ascii_alphanumeric())
}
