//! Server Configuration
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::http::StatusCode;

use crate::format::Formatter;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// Domain under which webhook hosts live (`<channel>.<hook_domain>`)
    pub hook_domain: String,

    /// Public base URL of the observer UI
    pub public_url: String,

    /// Shared secret expected as `Authorization: Bearer <token>` (optional)
    pub auth_token: Option<String>,

    /// Status code used when rejecting a request for bad credentials (default: 200)
    pub auth_failure_status: StatusCode,

    /// Template used to log received JSON webhook bodies (optional)
    pub output_format: Option<String>,

    /// Maximum accepted request body in bytes (default: 2MB)
    pub max_body_size: usize,

    /// Observer connection tuning
    pub ws: ConnectionSettings,
}

/// Tuning for observer connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Deadline for every write to the peer (default: 10s)
    pub write_timeout: Duration,
    /// Time allowed between frames from the peer (default: 60s)
    pub pong_timeout: Duration,
    /// Maximum size of one inbound peer message (default: 4096)
    pub max_message_size: usize,
    /// Capacity of the outbound queue (default: 4096)
    pub send_queue_capacity: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(60),
            max_message_size: 4096,
            send_queue_capacity: 4096,
        }
    }
}

impl ConnectionSettings {
    /// Keepalive probe period: nine tenths of the pong timeout, and always
    /// strictly below it.
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        let period = self.pong_timeout * 9 / 10;
        if period < self.pong_timeout {
            period
        } else {
            self.pong_timeout.saturating_sub(Duration::from_millis(1))
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pong_timeout.is_zero() {
            bail!("WS_PONG_TIMEOUT_SECS must be greater than zero");
        }
        if self.write_timeout.is_zero() {
            bail!("WS_WRITE_TIMEOUT_SECS must be greater than zero");
        }
        if self.max_message_size == 0 {
            bail!("WS_MAX_MESSAGE_SIZE must be greater than zero");
        }
        if self.send_queue_capacity == 0 {
            bail!("WS_SEND_QUEUE_CAPACITY must be greater than zero");
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = ConnectionSettings::default();

        let auth_failure_status = match env::var("AUTH_FAILURE_STATUS") {
            Ok(raw) => {
                let code: u16 = raw
                    .parse()
                    .with_context(|| format!("AUTH_FAILURE_STATUS is not a number: {raw}"))?;
                StatusCode::from_u16(code)
                    .with_context(|| format!("AUTH_FAILURE_STATUS is not a valid status: {code}"))?
            }
            Err(_) => StatusCode::OK,
        };

        let config = Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            hook_domain: env::var("HOOK_DOMAIN").unwrap_or_else(|_| "hooks.localhost".into()),
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into())
                .trim_end_matches('/')
                .to_string(),
            auth_token: env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty()),
            auth_failure_status,
            output_format: env::var("OUTPUT_FORMAT").ok().filter(|f| !f.is_empty()),
            max_body_size: env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2 * 1024 * 1024), // 2MB
            ws: ConnectionSettings {
                write_timeout: env_secs("WS_WRITE_TIMEOUT_SECS").unwrap_or(defaults.write_timeout),
                pong_timeout: env_secs("WS_PONG_TIMEOUT_SECS").unwrap_or(defaults.pong_timeout),
                max_message_size: env::var("WS_MAX_MESSAGE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_message_size),
                send_queue_capacity: env::var("WS_SEND_QUEUE_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.send_queue_capacity),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the settings that would otherwise fail at request time.
    pub fn validate(&self) -> Result<()> {
        self.ws.validate()?;
        if self.hook_domain.trim_matches('.').is_empty() {
            bail!("HOOK_DOMAIN must not be empty");
        }
        if let Some(template) = &self.output_format {
            Formatter::parse(template).context("OUTPUT_FORMAT is not a valid template")?;
        }
        Ok(())
    }

    /// Check if webhook senders must present the shared secret.
    #[must_use]
    pub const fn has_auth(&self) -> bool {
        self.auth_token.is_some()
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:0".into(),
            hook_domain: "hooks.test".into(),
            public_url: "http://localhost:8080".into(),
            auth_token: None,
            auth_failure_status: StatusCode::OK,
            output_format: None,
            max_body_size: 2 * 1024 * 1024,
            ws: ConnectionSettings::default(),
        }
    }
}

/// Parse a whole number of seconds from an environment variable.
fn env_secs(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const VARS: [&str; 11] = [
        "BIND_ADDRESS",
        "HOOK_DOMAIN",
        "PUBLIC_URL",
        "AUTH_TOKEN",
        "AUTH_FAILURE_STATUS",
        "OUTPUT_FORMAT",
        "MAX_BODY_SIZE",
        "WS_WRITE_TIMEOUT_SECS",
        "WS_PONG_TIMEOUT_SECS",
        "WS_MAX_MESSAGE_SIZE",
        "WS_SEND_QUEUE_CAPACITY",
    ];

    fn clear_env() {
        for key in VARS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_from_empty_env() {
        clear_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.hook_domain, "hooks.localhost");
        assert!(!config.has_auth());
        assert_eq!(config.auth_failure_status, StatusCode::OK);
        assert_eq!(config.ws, ConnectionSettings::default());
    }

    #[test]
    #[serial]
    fn test_overrides_from_env() {
        clear_env();
        env::set_var("AUTH_TOKEN", "s3cret");
        env::set_var("AUTH_FAILURE_STATUS", "401");
        env::set_var("PUBLIC_URL", "https://hooks.example.com/");
        env::set_var("WS_PONG_TIMEOUT_SECS", "30");
        env::set_var("WS_SEND_QUEUE_CAPACITY", "8");

        let config = Config::from_env().unwrap();
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(config.auth_failure_status, StatusCode::UNAUTHORIZED);
        assert_eq!(config.public_url, "https://hooks.example.com");
        assert_eq!(config.ws.pong_timeout, Duration::from_secs(30));
        assert_eq!(config.ws.send_queue_capacity, 8);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_are_rejected() {
        clear_env();
        env::set_var("AUTH_FAILURE_STATUS", "42");
        assert!(Config::from_env().is_err());

        clear_env();
        env::set_var("WS_PONG_TIMEOUT_SECS", "0");
        assert!(Config::from_env().is_err());

        clear_env();
        env::set_var("OUTPUT_FORMAT", "{{ .unterminated");
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_ping_period_below_pong_timeout() {
        for secs in 1..=3600 {
            let settings = ConnectionSettings {
                pong_timeout: Duration::from_secs(secs),
                ..ConnectionSettings::default()
            };
            assert!(settings.ping_period() < settings.pong_timeout, "pong={secs}s");
        }

        for millis in 1..=50 {
            let settings = ConnectionSettings {
                pong_timeout: Duration::from_millis(millis),
                ..ConnectionSettings::default()
            };
            assert!(settings.ping_period() < settings.pong_timeout, "pong={millis}ms");
        }
    }

    #[test]
    fn test_default_ping_period_is_nine_tenths() {
        assert_eq!(
            ConnectionSettings::default().ping_period(),
            Duration::from_secs(54)
        );
    }
}
