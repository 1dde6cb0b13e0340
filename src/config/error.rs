//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Host is not an IP address: {0}")]
    InvalidHost(String),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Prefetch limit must be greater than zero: {0}")]
    InvalidPrefetchLimit(&'static str),

    #[error("Poll duration must be greater than zero: {0}")]
    InvalidPollDuration(&'static str),
}
