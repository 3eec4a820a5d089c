//! A client for sending alert emails through Postmark.

use super::retry::{send_with_retry, DEFAULT_TIMEOUT};
use super::transport::{HttpResponse, HttpTransport, OutboundRequest};
use super::{AlertChannel, Channel, ChannelError};
use crate::config::{EmailConfig, SecretString};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

const TOKEN_HEADER: &str = "X-Postmark-Server-Token";

/// Sends alerts as transactional email via the Postmark HTTP API.
pub struct PostmarkNotifier {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    from_address: String,
    subject: String,
    token: SecretString,
    timeout: Duration,
}

impl PostmarkNotifier {
    /// Builds a notifier from config, or `None` when no server token is set.
    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &EmailConfig) -> Option<Self> {
        let token = config.token()?;
        Some(Self {
            transport,
            endpoint: config.endpoint.clone(),
            from_address: config.from_address.clone(),
            subject: config.subject.clone(),
            token: SecretString::new(token),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Overrides the per-attempt timeout window.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_request(&self, to: &str, message: &str) -> OutboundRequest {
        let payload = json!({
            "From": self.from_address,
            "To": to,
            "Subject": self.subject,
            "TextBody": message,
            "HtmlBody": format!("<p>{}</p>", escape_html(message)),
        });
        OutboundRequest::new(&self.endpoint, payload)
            .header("Accept", "application/json")
            .header(TOKEN_HEADER, self.token.expose())
    }

    fn classify(response: HttpResponse) -> Result<(), ChannelError> {
        if response.is_success() {
            return Ok(());
        }
        // Postmark explains rejections in a JSON body; anything else is
        // reported as an empty object.
        let detail = serde_json::from_str::<Value>(&response.body).unwrap_or_else(|_| json!({}));
        warn!(status = response.status, %detail, "Postmark rejected the alert email");
        Err(ChannelError::EmailRejected {
            status: response.status,
            detail,
        })
    }
}

#[async_trait]
impl AlertChannel for PostmarkNotifier {
    fn kind(&self) -> Channel {
        Channel::Email
    }

    /// Emails `message` to the address in `target`.
    #[instrument(skip_all, fields(channel = "email"))]
    async fn send(&self, target: &str, message: &str) -> Result<(), ChannelError> {
        send_with_retry(
            self.transport.as_ref(),
            Channel::Email,
            self.timeout,
            || self.build_request(target, message),
            Self::classify,
        )
        .await?;
        info!("Successfully sent alert email.");
        Ok(())
    }
}

/// Escapes the characters that are significant in HTML text.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
