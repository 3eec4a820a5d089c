#![allow(dead_code)] // Not every test binary uses every helper

pub mod fake_transport;

use doughwatch::config::{AlertsConfig, Config, SecretString};

pub const SLACK_URL: &str = "https://hooks.slack.com/services/T000/B000/XXXX";
pub const POSTMARK_URL: &str = "https://api.postmarkapp.com/email";
pub const SHOP_DOMAIN: &str = "bakery.myshopify.com";

/// Default alert configuration with a Postmark token set.
pub fn alerts_config_with_token() -> AlertsConfig {
    let mut alerts = Config::default().alerts;
    alerts.email.server_token = Some(SecretString::new("pm-test-token"));
    alerts
}

/// Default alert configuration without a Postmark token.
pub fn alerts_config_without_token() -> AlertsConfig {
    Config::default().alerts
}
