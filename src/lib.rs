/// DoughWatch - stock monitoring alerts for Shopify merchants
///
/// This library provides the settings validation engine and the alert
/// dispatcher that delivers notifications over Slack and email.
pub mod cli;
pub mod config;
pub mod notification;
pub mod settings;
pub mod validation;

// Re-export the entry points for convenience
pub use notification::{AlertDispatcher, Channel, DispatchResult};
pub use settings::{AlertChannelConfig, SettingsDraft, ShopSettings};
pub use validation::{check_alert_channels, validate, validate_settings, ValidationResult};
