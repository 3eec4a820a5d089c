//! Configuration management for DoughWatch
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer built-in defaults, a `doughwatch.toml` file,
//! environment variables and command-line overrides.

use crate::cli::ConfigArgs;
use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Used when no `--config` path is given. A missing file is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "doughwatch.toml";

/// The environment variable the hosting platform puts the Postmark token in.
pub const POSTMARK_TOKEN_ENV: &str = "POSTMARK_SERVER_TOKEN";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level, used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Configuration for alert delivery.
    pub alerts: AlertsConfig,
}

/// Configuration for alert delivery.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AlertsConfig {
    /// Timeout for a single delivery attempt, in seconds.
    pub timeout_seconds: u64,
    /// Sender identity shown in Slack.
    pub slack: SlackIdentity,
    /// Postmark email settings.
    pub email: EmailConfig,
}

impl AlertsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// How alerts present themselves in a Slack channel.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SlackIdentity {
    pub username: String,
    pub icon_emoji: String,
}

/// Configuration for the Postmark email channel.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmailConfig {
    /// The Postmark send endpoint.
    pub endpoint: String,
    /// The sender address on every alert email.
    pub from_address: String,
    /// The subject line on every alert email.
    pub subject: String,
    /// Postmark server token. Without it the email channel is disabled.
    #[serde(default)]
    pub server_token: Option<SecretString>,
}

impl EmailConfig {
    /// The token, if one is set and not blank.
    pub fn token(&self) -> Option<&str> {
        self.server_token
            .as_ref()
            .map(SecretString::expose)
            .filter(|token| !token.trim().is_empty())
    }
}

/// A string that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl Config {
    /// Loads the configuration, layering (lowest first): defaults, the TOML
    /// file, `DOUGHWATCH_*` variables, `POSTMARK_SERVER_TOKEN`, and the
    /// command-line overrides.
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        let path = args
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            // e.g. DOUGHWATCH_ALERTS__TIMEOUT_SECONDS=5
            .merge(Env::prefixed("DOUGHWATCH_").split("__"));
        // Read verbatim: figment's env parsing would turn a numeric token
        // into an integer.
        if let Ok(token) = env::var(POSTMARK_TOKEN_ENV) {
            figment = figment.merge(Serialized::default("alerts.email.server_token", token));
        }

        let config: Config = figment
            .merge(args.clone())
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.alerts.timeout_seconds == 0 {
            bail!("alerts.timeout_seconds must be at least 1");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            alerts: AlertsConfig {
                timeout_seconds: 10,
                slack: SlackIdentity {
                    username: "DoughWatch".to_string(),
                    icon_emoji: ":warning:".to_string(),
                },
                email: EmailConfig {
                    endpoint: "https://api.postmarkapp.com/email".to_string(),
                    from_address: "alerts@doughwatch.app".to_string(),
                    subject: "DoughWatch Test Alert".to_string(),
                    server_token: None,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let email = EmailConfig {
            server_token: Some(SecretString::new("pm-123")),
            ..Config::default().alerts.email
        };
        let printed = format!("{:?}", email);
        assert!(!printed.contains("pm-123"));
        assert_eq!(email.token(), Some("pm-123"));
    }

    #[test]
    fn test_blank_token_disables_email() {
        let email = EmailConfig {
            server_token: Some(SecretString::new("  ")),
            ..Config::default().alerts.email
        };
        assert_eq!(email.token(), None);
    }
}
