//! A client for sending alerts to a Slack incoming webhook.

use super::retry::{send_with_retry, DEFAULT_TIMEOUT};
use super::transport::{HttpResponse, HttpTransport, OutboundRequest};
use super::{AlertChannel, Channel, ChannelError};
use crate::config::SlackIdentity;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Posts alerts to a Slack webhook as a fixed sender identity.
pub struct SlackNotifier {
    transport: Arc<dyn HttpTransport>,
    identity: SlackIdentity,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(transport: Arc<dyn HttpTransport>, identity: SlackIdentity) -> Self {
        Self {
            transport,
            identity,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-attempt timeout window.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_request(&self, webhook_url: &str, message: &str) -> OutboundRequest {
        let payload = json!({
            "text": message,
            "username": self.identity.username,
            "icon_emoji": self.identity.icon_emoji,
        });
        OutboundRequest::new(webhook_url, payload)
    }

    fn classify(response: HttpResponse) -> Result<(), ChannelError> {
        if response.is_success() {
            return Ok(());
        }
        warn!(
            status = response.status,
            body = %response.body,
            "Slack webhook rejected the alert"
        );
        Err(ChannelError::SlackRejected {
            status: response.status,
            reason: response.reason,
        })
    }
}

#[async_trait]
impl AlertChannel for SlackNotifier {
    fn kind(&self) -> Channel {
        Channel::Slack
    }

    /// Sends `message` to the webhook at `target`.
    #[instrument(skip_all, fields(channel = "slack"))]
    async fn send(&self, target: &str, message: &str) -> Result<(), ChannelError> {
        send_with_retry(
            self.transport.as_ref(),
            Channel::Slack,
            self.timeout,
            || self.build_request(target, message),
            Self::classify,
        )
        .await?;
        info!("Successfully sent alert to Slack.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::notification::ReqwestTransport;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier() -> SlackNotifier {
        SlackNotifier::new(
            Arc::new(ReqwestTransport::new()),
            Config::default().alerts.slack,
        )
    }

    #[tokio::test]
    async fn test_slack_send_success() {
        // Arrange
        let server = MockServer::start().await;
        let expected_body = json!({
            "text": "Sourdough is back in stock",
            "username": "DoughWatch",
            "icon_emoji": ":warning:",
        });

        Mock::given(method("POST"))
            .and(path("/services/T0/B0/X"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(&expected_body))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        // Act
        let result = notifier()
            .send(
                &format!("{}/services/T0/B0/X", server.uri()),
                "Sourdough is back in stock",
            )
            .await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_slack_handles_server_error() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        // Act
        let result = notifier().send(&server.uri(), "hello").await;

        // Assert
        let err = result.unwrap_err();
        assert!(matches!(err, ChannelError::SlackRejected { status: 500, .. }));
        assert_eq!(err.to_string(), "Slack API error: 500 Internal Server Error");
    }

    #[tokio::test]
    async fn test_slack_retries_once_on_timeout() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let notifier = notifier().with_timeout(Duration::from_millis(200));

        // Act
        let result = notifier.send(&server.uri(), "hello").await;

        // Assert
        assert!(matches!(
            result,
            Err(ChannelError::TimedOut { attempts: 2, .. })
        ));
    }
}
