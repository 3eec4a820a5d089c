//! Shop settings: the typed record, its untyped draft form, and the channel
//! configuration derived from it.
//!
//! A `SettingsDraft` is what a merchant submits (or what an operator puts in
//! a JSON file). It may be missing fields or carry values of the wrong type,
//! which is why the validator works on drafts. `ShopSettings` is the typed
//! record a draft becomes once it has passed validation.

use crate::validation::{self, ValidationErrors};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// How often a shop's product page is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "Number", into = "u32")]
pub enum Frequency {
    Every30Minutes,
    #[default]
    Every60Minutes,
    Every120Minutes,
}

impl Frequency {
    /// The accepted values, in minutes.
    pub const ALLOWED_MINUTES: &[u32] = &[30, 60, 120];

    pub fn minutes(self) -> u32 {
        match self {
            Frequency::Every30Minutes => 30,
            Frequency::Every60Minutes => 60,
            Frequency::Every120Minutes => 120,
        }
    }
}

impl TryFrom<u32> for Frequency {
    type Error = String;

    fn try_from(minutes: u32) -> std::result::Result<Self, Self::Error> {
        match minutes {
            30 => Ok(Frequency::Every30Minutes),
            60 => Ok(Frequency::Every60Minutes),
            120 => Ok(Frequency::Every120Minutes),
            other => Err(format!("unsupported frequency: {} minutes", other)),
        }
    }
}

/// Any JSON number equal to an allowed value, so `60.0` decodes like `60`.
impl TryFrom<Number> for Frequency {
    type Error = String;

    fn try_from(number: Number) -> std::result::Result<Self, Self::Error> {
        let minutes = number
            .as_f64()
            .filter(|m| m.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(m))
            .ok_or_else(|| format!("unsupported frequency: {} minutes", number))?;
        Frequency::try_from(minutes as u32)
    }
}

impl From<Frequency> for u32 {
    fn from(frequency: Frequency) -> Self {
        frequency.minutes()
    }
}

/// The validated monitoring configuration of a single shop.
///
/// Optional channel fields use the empty string for "not configured", which
/// matches the shape stored by the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopSettings {
    pub enabled: bool,
    #[serde(rename = "frequencyMinutes")]
    pub frequency_minutes: Frequency,
    #[serde(rename = "productURL", default)]
    pub product_url: String,
    #[serde(rename = "slackWebhookUrl", default)]
    pub slack_webhook_url: String,
    #[serde(rename = "alertEmail", default)]
    pub alert_email: String,
}

/// Monitoring off, hourly checks, no product and no channels. A purged shop
/// is reset to exactly this.
impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency_minutes: Frequency::default(),
            product_url: String::new(),
            slack_webhook_url: String::new(),
            alert_email: String::new(),
        }
    }
}

/// Errors returned when turning a draft into typed settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings failed validation: {0}")]
    Invalid(ValidationErrors),

    #[error("settings could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ShopSettings {
    /// Validates a draft and, if it passes, decodes it into typed settings.
    pub fn from_draft(
        draft: &SettingsDraft,
        shop_domain: Option<&str>,
    ) -> Result<Self, SettingsError> {
        let result = validation::validate(draft, shop_domain);
        if let Some(errors) = result.errors {
            return Err(SettingsError::Invalid(errors));
        }
        Ok(serde_json::from_value(Value::Object(draft.fields.clone()))?)
    }

    /// The subset of these settings the alert dispatcher needs.
    pub fn alert_channels(&self) -> AlertChannelConfig {
        AlertChannelConfig::from(self)
    }
}

/// A candidate settings record that has not been validated yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsDraft {
    fields: Map<String, Value>,
}

impl SettingsDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a draft from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON from settings file: {}", path.display()))?;
        Ok(Self::from_value(value))
    }

    /// Wraps a JSON value. Anything other than an object becomes an empty
    /// draft, so every required field is reported missing.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    /// Sets a field, replacing any previous value.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Removes a field entirely, as if the form never sent it.
    pub fn without(mut self, field: &str) -> Self {
        self.fields.remove(field);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// `true` only when `enabled` is present and literally `true`.
    pub fn is_enabled(&self) -> bool {
        matches!(self.get("enabled"), Some(Value::Bool(true)))
    }
}

impl From<&ShopSettings> for SettingsDraft {
    fn from(settings: &ShopSettings) -> Self {
        match serde_json::to_value(settings) {
            Ok(value) => Self::from_value(value),
            Err(_) => Self::default(),
        }
    }
}

/// Where alerts for a shop should be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertChannelConfig {
    #[serde(rename = "slackWebhookUrl", skip_serializing_if = "Option::is_none")]
    pub slack_webhook_url: Option<String>,
    #[serde(rename = "alertEmail", skip_serializing_if = "Option::is_none")]
    pub alert_email: Option<String>,
}

impl AlertChannelConfig {
    pub fn new(slack_webhook_url: Option<&str>, alert_email: Option<&str>) -> Self {
        Self {
            slack_webhook_url: non_blank(slack_webhook_url),
            alert_email: non_blank(alert_email),
        }
    }

    /// The Slack webhook, if one is configured.
    pub fn slack(&self) -> Option<&str> {
        self.slack_webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// The alert email address, if one is configured.
    pub fn email(&self) -> Option<&str> {
        self.alert_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.slack().is_none() && self.email().is_none()
    }
}

impl From<&ShopSettings> for AlertChannelConfig {
    fn from(settings: &ShopSettings) -> Self {
        Self::new(
            Some(settings.slack_webhook_url.as_str()),
            Some(settings.alert_email.as_str()),
        )
    }
}

impl From<&SettingsDraft> for AlertChannelConfig {
    fn from(draft: &SettingsDraft) -> Self {
        Self::new(
            draft.get("slackWebhookUrl").and_then(Value::as_str),
            draft.get("alertEmail").and_then(Value::as_str),
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
