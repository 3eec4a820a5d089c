//! Alert delivery over Slack and email.
//!
//! The [`dispatcher::AlertDispatcher`] tries the configured channels in a fixed
//! order (Slack, then email) and stops at the first one that delivers. Each
//! channel is an [`AlertChannel`]; the concrete senders sit on top of an
//! [`transport::HttpTransport`] so both layers can be replaced in tests.
pub mod dispatcher;
pub mod email;
pub mod retry;
pub mod slack;
pub mod transport;

pub use dispatcher::AlertDispatcher;
pub use email::PostmarkNotifier;
pub use slack::SlackNotifier;
pub use transport::{HttpResponse, HttpTransport, OutboundRequest, ReqwestTransport};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A notification transport an alert can be delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Slack,
    Email,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Slack => "slack",
            Channel::Email => "email",
        }
    }

    /// The name used in merchant-facing messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Channel::Slack => "Slack",
            Channel::Email => "email",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The aggregate outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
}

/// Returned when nothing was configured or every configured channel failed.
pub const NO_CHANNEL_SUCCEEDED: &str = "No alert channels configured or all channels failed";

impl DispatchResult {
    pub fn delivered(channel: Channel, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            channel: Some(channel),
        }
    }

    pub fn undelivered() -> Self {
        Self {
            success: false,
            message: NO_CHANNEL_SUCCEEDED.to_string(),
            channel: None,
        }
    }
}

/// Why a single channel failed to deliver.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Slack API error: {status} {reason}")]
    SlackRejected { status: u16, reason: String },

    #[error("Postmark API error: {status} - {detail}")]
    EmailRejected {
        status: u16,
        detail: serde_json::Value,
    },

    #[error("request failed: {0}")]
    Network(String),

    #[error("request timed out {attempts} times after {window:?} each")]
    TimedOut { attempts: u32, window: Duration },
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        ChannelError::Network(err.to_string())
    }
}

/// A sender able to deliver a message to one kind of target.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Which channel this sender implements.
    fn kind(&self) -> Channel;

    /// Delivers `message` to `target` (a webhook URL or an email address).
    async fn send(&self, target: &str, message: &str) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_result_serialization() {
        let delivered = DispatchResult::delivered(Channel::Slack, "sent");
        assert_eq!(
            serde_json::to_value(&delivered).unwrap(),
            json!({ "success": true, "message": "sent", "channel": "slack" })
        );

        let failed = DispatchResult::undelivered();
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({ "success": false, "message": NO_CHANNEL_SUCCEEDED })
        );
    }

    #[test]
    fn test_email_rejection_embeds_detail() {
        let err = ChannelError::EmailRejected {
            status: 422,
            detail: json!({ "ErrorCode": 300 }),
        };
        assert_eq!(
            err.to_string(),
            r#"Postmark API error: 422 - {"ErrorCode":300}"#
        );
    }
}
