//! Common utilities and types shared across the campus attendance crates.

#![warn(clippy::pedantic)]

/// Module for common data types
pub mod types;

/// Module for common configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for reading claims out of backend-issued access tokens
pub mod claims;
