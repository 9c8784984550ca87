//! Attendance configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use crate::camera::CaptureSettings;
use crate::countdown::DEFAULT_COUNTDOWN_SECONDS;
use crate::generator::GeneratorSettings;
use crate::reconciler::ReconcilerSettings;
use common::config::{ObservabilityConfig, DEFAULT_LOG_FILTER};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default backend call timeout in seconds.
pub const DEFAULT_BACKEND_TIMEOUT_SECONDS: u64 = 15;

/// Attendance configuration.
#[derive(Clone)]
pub struct Config {
    /// Backend project URL, e.g. `https://project.example.co`.
    pub backend_url: String,

    /// Public API key sent with every backend request.
    pub anon_key: SecretString,

    /// Access token of the signed-in user, if provided up front.
    pub access_token: Option<SecretString>,

    /// Session validity window and countdown length (default: 300).
    pub session_duration_seconds: u32,

    /// Bound on each backend call (default: 15s).
    pub backend_timeout: Duration,

    /// Look up an existing record before recording a scan (default: true).
    pub precheck_existing: bool,

    pub observability: ObservabilityConfig,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backend_url", &self.backend_url)
            .field("anon_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("session_duration_seconds", &self.session_duration_seconds)
            .field("backend_timeout", &self.backend_timeout)
            .field("precheck_existing", &self.precheck_existing)
            .field("observability", &self.observability)
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// - `MissingEnvVar` - `ATTENDANCE_BACKEND_URL` or `ATTENDANCE_BACKEND_ANON_KEY` unset
    /// - `InvalidValue` - a value does not parse or is out of range
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let backend_url = vars
            .get("ATTENDANCE_BACKEND_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("ATTENDANCE_BACKEND_URL".to_string()))?
            .clone();
        if !(backend_url.starts_with("https://") || backend_url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue(
                "ATTENDANCE_BACKEND_URL must be an http(s) URL".to_string(),
            ));
        }

        let anon_key = SecretString::from(
            vars.get("ATTENDANCE_BACKEND_ANON_KEY")
                .ok_or_else(|| {
                    ConfigError::MissingEnvVar("ATTENDANCE_BACKEND_ANON_KEY".to_string())
                })?
                .clone(),
        );

        let access_token = vars
            .get("ATTENDANCE_ACCESS_TOKEN")
            .filter(|token| !token.is_empty())
            .cloned()
            .map(SecretString::from);

        let session_duration_seconds: u32 = parse_or(
            vars,
            "ATTENDANCE_SESSION_DURATION_SECONDS",
            DEFAULT_COUNTDOWN_SECONDS,
        )?;
        if session_duration_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "ATTENDANCE_SESSION_DURATION_SECONDS must be greater than zero".to_string(),
            ));
        }

        let backend_timeout_seconds: u64 = parse_or(
            vars,
            "ATTENDANCE_BACKEND_TIMEOUT_SECONDS",
            DEFAULT_BACKEND_TIMEOUT_SECONDS,
        )?;
        if backend_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "ATTENDANCE_BACKEND_TIMEOUT_SECONDS must be greater than zero".to_string(),
            ));
        }

        let precheck_existing = parse_bool_or(vars, "ATTENDANCE_PRECHECK_EXISTING", true)?;

        let observability = ObservabilityConfig {
            log_level: vars
                .get("ATTENDANCE_LOG_LEVEL")
                .cloned()
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            json_logs: parse_bool_or(vars, "ATTENDANCE_LOG_JSON", false)?,
        };

        Ok(Config {
            backend_url,
            anon_key,
            access_token,
            session_duration_seconds,
            backend_timeout: Duration::from_secs(backend_timeout_seconds),
            precheck_existing,
            observability,
        })
    }

    #[must_use]
    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            session_duration_seconds: self.session_duration_seconds,
            backend_timeout: self.backend_timeout,
        }
    }

    #[must_use]
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            backend_timeout: self.backend_timeout,
            precheck_existing: self.precheck_existing,
            capture: CaptureSettings::default(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{key} must be a number, got {raw:?}"))),
    }
}

fn parse_bool_or(
    vars: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue(format!(
                "{key} must be true or false, got {v:?}"
            ))),
        },
    }
}
