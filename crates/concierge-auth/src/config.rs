//! Client configuration.
//!
//! This module defines the configuration shared by the transport and the
//! gateway.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Configuration for the concierge client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST API, including any path prefix (e.g. `/api`).
    #[serde(default = "ClientConfig::default_base_url")]
    pub base_url: String,

    /// Path of the login endpoint, relative to `base_url`.
    #[serde(default = "ClientConfig::default_login_path")]
    pub login_path: String,

    /// Whole-request timeout in seconds.
    #[serde(default = "ClientConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connect timeout in seconds.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Delay before the session-expired notification is published, in milliseconds.
    #[serde(default = "ClientConfig::default_expiry_delay")]
    pub expiry_notice_delay_ms: u64,

    /// Directory of the durable session store.
    #[serde(default = "ClientConfig::default_store_path")]
    pub store_path: String,
}

impl ClientConfig {
    fn default_base_url() -> String {
        "http://localhost:5000/api".to_string()
    }

    fn default_login_path() -> String {
        "/auth/admin/login".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    const fn default_expiry_delay() -> u64 {
        100
    }

    fn default_store_path() -> String {
        ".concierge/session".to_string()
    }

    /// Defaults overlaid with `CONCIERGE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup("CONCIERGE_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(login_path) = lookup("CONCIERGE_LOGIN_PATH") {
            config.login_path = login_path;
        }
        if let Some(store_path) = lookup("CONCIERGE_STORE_PATH") {
            config.store_path = store_path;
        }
        if let Some(value) = lookup("CONCIERGE_REQUEST_TIMEOUT") {
            config.request_timeout_seconds = parse_u64("CONCIERGE_REQUEST_TIMEOUT", value)?;
        }
        if let Some(value) = lookup("CONCIERGE_EXPIRY_DELAY_MS") {
            config.expiry_notice_delay_ms = parse_u64("CONCIERGE_EXPIRY_DELAY_MS", value)?;
        }

        Ok(config)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get the expiry notification delay as a `Duration`.
    #[must_use]
    pub fn expiry_notice_delay(&self) -> Duration {
        Duration::from_millis(self.expiry_notice_delay_ms)
    }
}

fn parse_u64(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            login_path: Self::default_login_path(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            expiry_notice_delay_ms: Self::default_expiry_delay(),
            store_path: Self::default_store_path(),
        }
    }
}
