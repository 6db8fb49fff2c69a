//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys
//! use `__` as separator, e.g. `NATS__URL` or `RETRY__MAX_ATTEMPTS`.

use nodeflow_nodes::{OpenRouterConfig, TelegramConfig};
use nodeflow_workflow::RetryPolicy;
use nodeflow_workflow::nats::NatsConfig;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// NATS connection and subject configuration.
    #[serde(default)]
    pub nats: NatsConfig,

    /// Retry policy for durable steps.
    #[serde(default)]
    pub retry: RetryConfig,

    /// OpenRouter API configuration.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Telegram Bot API configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Externally reachable base URL of this server. Telegram bots are
    /// pointed at webhooks under it.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Timeout for outbound HTTP requests made by nodes, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

/// Retry settings for durable steps.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per step, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Factor applied to the delay after each retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Returns the policy the step runner applies.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the outbound request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_config_has_correct_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.policy(), RetryPolicy::STANDARD);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(config.policy().max_attempts, 1);
    }

    #[test]
    fn only_database_url_is_required() {
        let config: ServerConfig = config::Config::builder()
            .set_override("database_url", "postgres://localhost/nodeflow")
            .and_then(|b| b.set_override("nats.url", "nats://nats:4222"))
            .and_then(|b| b.set_override("retry.max_attempts", 5))
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .expect("configuration loads");

        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.nats.url, "nats://nats:4222");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 1_000);
        assert_eq!(config.openrouter, OpenRouterConfig::default());
        assert_eq!(config.telegram, TelegramConfig::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.public_base_url, None);
    }

    #[test]
    fn public_base_url_is_read() {
        let config: ServerConfig = config::Config::builder()
            .set_override("database_url", "postgres://localhost/nodeflow")
            .and_then(|b| b.set_override("public_base_url", "https://flows.example.com"))
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .expect("configuration loads");

        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://flows.example.com")
        );
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let result: Result<ServerConfig, _> = config::Config::builder()
            .build()
            .and_then(|c| c.try_deserialize());
        assert!(result.is_err());
    }
}
