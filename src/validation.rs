//! The settings validation engine.
//!
//! The schema is a fixed, ordered list of [`FieldSpec`] descriptors. Every
//! descriptor is checked with the same contract, `check(value, draft)`, and
//! the first failing rule for a field becomes that field's only error. A
//! single cross-field rule (the product URL must live on the shop's own
//! domain) runs after the per-field pass.
//!
//! Validation never fails as such: every outcome, good or bad, is a
//! [`ValidationResult`].

use crate::settings::{AlertChannelConfig, Frequency, SettingsDraft, ShopSettings};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;
use url::Url;

pub const FIELD_ENABLED: &str = "enabled";
pub const FIELD_FREQUENCY: &str = "frequencyMinutes";
pub const FIELD_PRODUCT_URL: &str = "productURL";
pub const FIELD_SLACK_WEBHOOK: &str = "slackWebhookUrl";
pub const FIELD_ALERT_EMAIL: &str = "alertEmail";

/// Returned by [`check_alert_channels`] when a shop has nowhere to send alerts.
pub const NO_CHANNELS_WARNING: &str =
    "No alert channels configured. Add Slack webhook URL or email to receive alerts.";

const PRODUCT_URL_REQUIRED: &str = "Product URL is required when monitoring is enabled";

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Field name to error message, one message per field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, field: &str, message: String) {
        self.0.insert(field.to_string(), message);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

/// The outcome of validating a settings draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

impl ValidationResult {
    fn from_errors(errors: ValidationErrors) -> Self {
        if errors.is_empty() {
            Self {
                ok: true,
                errors: None,
            }
        } else {
            Self {
                ok: false,
                errors: Some(errors),
            }
        }
    }

    /// The error for a single field, if it failed.
    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.as_ref().and_then(|errors| errors.get(field))
    }
}

/// When a field must be present.
#[derive(Debug, Clone, Copy)]
enum Requirement {
    Always,
    /// Required only while monitoring is enabled; carries the message.
    WhenEnabled(&'static str),
    Optional,
}

/// The JSON primitive a field must hold.
#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Boolean,
    Number,
    String,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Number => value.is_number(),
            FieldKind::String => value.is_string(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldKind::Boolean => "boolean",
            FieldKind::Number => "number",
            FieldKind::String => "string",
        }
    }
}

type CustomCheck = fn(&Value, &SettingsDraft) -> Result<(), String>;

/// One entry of the settings schema.
struct FieldSpec {
    name: &'static str,
    requirement: Requirement,
    kind: FieldKind,
    allowed: Option<&'static [u32]>,
    enum_message: Option<&'static str>,
    custom: Option<CustomCheck>,
}

impl FieldSpec {
    /// Applies this field's rules in order and returns the first failure.
    fn check(&self, value: Option<&Value>, draft: &SettingsDraft) -> Result<(), String> {
        let present = value.filter(|v| !v.is_null());

        let required = match self.requirement {
            Requirement::Always => true,
            Requirement::WhenEnabled(message) if draft.is_enabled() => {
                if present.map_or(true, is_blank) {
                    return Err(message.to_string());
                }
                true
            }
            Requirement::WhenEnabled(_) | Requirement::Optional => false,
        };

        let value = match present {
            Some(v) => v,
            None if required => return Err(format!("{} is required", self.name)),
            None => return Ok(()),
        };
        if !required && value.as_str() == Some("") {
            return Ok(());
        }

        if !self.kind.matches(value) {
            return Err(format!("{} must be a {}", self.name, self.kind.name()));
        }

        if let Some(allowed) = self.allowed {
            let number = value.as_f64();
            if !allowed.iter().any(|a| number == Some(f64::from(*a))) {
                return Err(match self.enum_message {
                    Some(message) => message.to_string(),
                    None => format!("{} must be one of: {}", self.name, join(allowed)),
                });
            }
        }

        match self.custom {
            Some(custom) => custom(value, draft),
            None => Ok(()),
        }
    }
}

static SCHEMA: &[FieldSpec] = &[
    FieldSpec {
        name: FIELD_ENABLED,
        requirement: Requirement::Always,
        kind: FieldKind::Boolean,
        allowed: None,
        enum_message: None,
        custom: None,
    },
    FieldSpec {
        name: FIELD_FREQUENCY,
        requirement: Requirement::Always,
        kind: FieldKind::Number,
        allowed: Some(Frequency::ALLOWED_MINUTES),
        enum_message: Some("Frequency must be 30, 60, or 120 minutes"),
        custom: None,
    },
    FieldSpec {
        name: FIELD_PRODUCT_URL,
        requirement: Requirement::WhenEnabled(PRODUCT_URL_REQUIRED),
        kind: FieldKind::String,
        allowed: None,
        enum_message: None,
        custom: Some(check_product_url),
    },
    FieldSpec {
        name: FIELD_SLACK_WEBHOOK,
        requirement: Requirement::Optional,
        kind: FieldKind::String,
        allowed: None,
        enum_message: None,
        custom: Some(check_slack_webhook),
    },
    FieldSpec {
        name: FIELD_ALERT_EMAIL,
        requirement: Requirement::Optional,
        kind: FieldKind::String,
        allowed: None,
        enum_message: None,
        custom: Some(check_alert_email),
    },
];

fn check_product_url(value: &Value, draft: &SettingsDraft) -> Result<(), String> {
    if !draft.is_enabled() {
        return Ok(());
    }
    let raw = value.as_str().unwrap_or_default();
    if raw.trim().is_empty() {
        return Err(PRODUCT_URL_REQUIRED.to_string());
    }
    let url = Url::parse(raw).map_err(|_| "Product URL must be a valid absolute URL".to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("Product URL must be a valid HTTP/HTTPS URL".to_string());
    }
    Ok(())
}

fn check_slack_webhook(value: &Value, _draft: &SettingsDraft) -> Result<(), String> {
    let raw = value.as_str().unwrap_or_default();
    if raw.trim().is_empty() {
        return Ok(());
    }
    let url = Url::parse(raw).map_err(|_| "Slack webhook URL must be a valid URL".to_string())?;
    match url.host_str() {
        Some(host) if host.contains("hooks.slack.com") => Ok(()),
        _ => Err("Slack webhook URL must be from hooks.slack.com".to_string()),
    }
}

fn check_alert_email(value: &Value, _draft: &SettingsDraft) -> Result<(), String> {
    let raw = value.as_str().unwrap_or_default();
    if raw.trim().is_empty() || EMAIL_PATTERN.is_match(raw) {
        Ok(())
    } else {
        Err("Alert email must be a valid email address".to_string())
    }
}

/// Validates a settings draft, optionally against the owning shop's domain.
pub fn validate(draft: &SettingsDraft, shop_domain: Option<&str>) -> ValidationResult {
    let mut errors = ValidationErrors::default();

    for spec in SCHEMA {
        if let Err(message) = spec.check(draft.get(spec.name), draft) {
            errors.insert(spec.name, message);
        }
    }

    let product_url = draft
        .get(FIELD_PRODUCT_URL)
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty());
    let shop_domain = shop_domain.filter(|domain| !domain.is_empty());
    if let (true, Some(url), Some(domain)) = (draft.is_enabled(), product_url, shop_domain) {
        if !errors.contains(FIELD_PRODUCT_URL) {
            if let Some(message) = validate_product_url_domain(url, domain) {
                errors.insert(FIELD_PRODUCT_URL, message);
            }
        }
    }

    if !errors.is_empty() {
        debug!(%errors, "Settings draft rejected");
    }
    ValidationResult::from_errors(errors)
}

/// Validates typed settings by way of their draft form.
pub fn validate_settings(settings: &ShopSettings, shop_domain: Option<&str>) -> ValidationResult {
    validate(&SettingsDraft::from(settings), shop_domain)
}

/// Checks that a product URL is hosted on the shop's own domain.
///
/// Returns the error message on mismatch, `None` when the hostnames agree
/// (ignoring case).
pub fn validate_product_url_domain(product_url: &str, shop_domain: &str) -> Option<String> {
    let url = match Url::parse(product_url) {
        Ok(url) => url,
        Err(_) => return Some("Invalid product URL format".to_string()),
    };
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if host == shop_domain.to_ascii_lowercase() {
        None
    } else {
        Some(format!(
            "Product URL must be from your shop domain ({})",
            shop_domain
        ))
    }
}

/// Advisory check: warns when neither Slack nor email is configured.
///
/// This is independent of [`validate`] and must never block a save.
pub fn check_alert_channels(settings: &ShopSettings) -> Option<String> {
    channel_warning(&AlertChannelConfig::from(settings))
}

/// The same advisory check for a draft that may not have validated.
pub fn check_draft_alert_channels(draft: &SettingsDraft) -> Option<String> {
    channel_warning(&AlertChannelConfig::from(draft))
}

fn channel_warning(channels: &AlertChannelConfig) -> Option<String> {
    channels.is_empty().then(|| NO_CHANNELS_WARNING.to_string())
}

fn is_blank(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.trim().is_empty())
}

fn join(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
