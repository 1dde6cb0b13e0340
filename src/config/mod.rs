//! Application configuration module
//!
//! Relay settings come from the environment only (plus an optional `.env`
//! file), read through the `config` crate with the `WWC` prefix and `__`
//! between nesting levels. Nothing is required: an empty environment gives
//! a local development setup pointing at Redis on localhost.
//!
//! # Example
//!
//! ```no_run
//! use webchat_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod error;
mod queue;
mod redirect;
mod server;

pub use error::{ConfigError, ValidationError};
pub use queue::QueueConfig;
pub use redirect::RedirectConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment loads successfully.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, log filter)
    #[serde(default)]
    pub server: ServerConfig,

    /// Routing switches for messages sent by registered clients
    #[serde(default)]
    pub websocket: RedirectConfig,

    /// Work queue (broker location and consumer cadence)
    #[serde(default)]
    pub queue: QueueConfig,
}

impl AppConfig {
    /// Read `.env` (if any) and the `WWC__`-prefixed environment.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `WWC__SERVER__PORT=8080` | `server.port` |
    /// | `WWC__WEBSOCKET__REDIRECT_TO_FRONTEND=true` | `websocket.redirect_to_frontend` |
    /// | `WWC__QUEUE__RETRY_POLL_DURATION_MS=30000` | `queue.retry_poll_duration_ms` |
    /// | `WWC__QUEUE__MAX_RETRIES=5` | `queue.max_retries` |
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("WWC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.queue.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("WWC__SERVER__PORT");
        env::remove_var("WWC__SERVER__ENVIRONMENT");
        env::remove_var("WWC__WEBSOCKET__REDIRECT_TO_FRONTEND");
        env::remove_var("WWC__WEBSOCKET__REDIRECT_TO_CALLBACK");
        env::remove_var("WWC__QUEUE__URL");
        env::remove_var("WWC__QUEUE__RETRY_POLL_DURATION_MS");
        env::remove_var("WWC__QUEUE__MAX_RETRIES");
    }

    #[test]
    fn test_load_defaults_from_empty_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.queue.tag, "wwcs-service");
        assert_eq!(config.queue.consumer_prefetch_limit, 1000);
        assert_eq!(config.websocket, RedirectConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_overrides_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("WWC__SERVER__PORT", "1234");
        env::set_var("WWC__WEBSOCKET__REDIRECT_TO_FRONTEND", "true");
        env::set_var("WWC__WEBSOCKET__REDIRECT_TO_CALLBACK", "false");
        env::set_var("WWC__QUEUE__URL", "redis://cache:6379/2");
        env::set_var("WWC__QUEUE__RETRY_POLL_DURATION_MS", "30000");
        env::set_var("WWC__QUEUE__MAX_RETRIES", "5");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 1234);
        assert_eq!(config.websocket, RedirectConfig::new(true, false));
        assert_eq!(config.queue.url, "redis://cache:6379/2");
        assert_eq!(config.queue.retry_poll_duration_ms, 30_000);
        assert_eq!(config.queue.max_retries, Some(5));
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("WWC__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_validate_rejects_bad_queue_url() {
        let mut config = AppConfig::default();
        config.queue.url = "localhost:6379".to_string();
        assert_eq!(config.validate(), Err(ValidationError::InvalidRedisUrl));
    }
}
