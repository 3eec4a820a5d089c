//! Ordered, fall-through delivery of one alert across the configured channels.

use super::email::PostmarkNotifier;
use super::slack::SlackNotifier;
use super::transport::HttpTransport;
use super::{AlertChannel, Channel, DispatchResult};
use crate::config::AlertsConfig;
use crate::settings::{AlertChannelConfig, ShopSettings};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Delivers alerts through Slack first and email second.
///
/// The dispatcher holds no mutable state, so a single instance can be shared
/// behind an `Arc` and used by many concurrent callers.
pub struct AlertDispatcher {
    slack: Arc<dyn AlertChannel>,
    /// `None` when no email provider token is configured.
    email: Option<Arc<dyn AlertChannel>>,
}

impl AlertDispatcher {
    /// Creates a dispatcher from explicit channel senders.
    pub fn new(slack: Arc<dyn AlertChannel>, email: Option<Arc<dyn AlertChannel>>) -> Self {
        Self { slack, email }
    }

    /// Builds the production senders on top of `transport`.
    pub fn from_config(config: &AlertsConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let slack = SlackNotifier::new(transport.clone(), config.slack.clone())
            .with_timeout(config.timeout());
        let email = PostmarkNotifier::from_config(transport, &config.email)
            .map(|notifier| Arc::new(notifier.with_timeout(config.timeout())) as Arc<dyn AlertChannel>);
        if email.is_none() {
            info!("No Postmark server token configured; email alerts are disabled.");
        }
        Self::new(Arc::new(slack), email)
    }

    /// Whether the email channel can be used at all.
    pub fn email_enabled(&self) -> bool {
        self.email.is_some()
    }

    /// Sends `message` through the first channel that accepts it.
    pub async fn send_alert(&self, channels: &AlertChannelConfig, message: &str) -> DispatchResult {
        self.dispatch(channels, message, "Alert").await
    }

    /// Sends the "test alert" merchants trigger from the settings page.
    pub async fn send_test_alert(&self, settings: &ShopSettings, shop_domain: &str) -> DispatchResult {
        let message = test_alert_message(shop_domain);
        self.dispatch(&settings.alert_channels(), &message, "Test alert")
            .await
    }

    async fn dispatch(
        &self,
        channels: &AlertChannelConfig,
        message: &str,
        label: &str,
    ) -> DispatchResult {
        match self.deliver(channels, message).await {
            Some(channel) => DispatchResult::delivered(
                channel,
                format!("{} sent successfully via {}", label, channel.display_name()),
            ),
            None => DispatchResult::undelivered(),
        }
    }

    /// Tries Slack, then email. Returns the channel that delivered, if any.
    #[instrument(skip_all)]
    async fn deliver(&self, channels: &AlertChannelConfig, message: &str) -> Option<Channel> {
        if channels.is_empty() {
            debug!("No alert channels configured; nothing to send.");
            record_outcome(None);
            return None;
        }

        if let Some(webhook_url) = channels.slack() {
            if try_channel(self.slack.as_ref(), webhook_url, message).await {
                record_outcome(Some(Channel::Slack));
                return Some(Channel::Slack);
            }
        }

        if let Some(address) = channels.email() {
            match &self.email {
                Some(email) => {
                    if try_channel(email.as_ref(), address, message).await {
                        record_outcome(Some(Channel::Email));
                        return Some(Channel::Email);
                    }
                }
                None => debug!("Skipping email channel: no server token configured."),
            }
        }

        warn!("Alert could not be delivered through any channel.");
        record_outcome(None);
        None
    }
}

/// The message sent by [`AlertDispatcher::send_test_alert`].
pub fn test_alert_message(shop_domain: &str) -> String {
    format!("DoughWatch test alert OK – {}", shop_domain)
}

/// Runs one channel, absorbing its error into a log line.
async fn try_channel(channel: &dyn AlertChannel, target: &str, message: &str) -> bool {
    let kind = channel.kind();
    info!(channel = %kind, "Attempting alert delivery");
    match channel.send(target, message).await {
        Ok(()) => true,
        Err(e) => {
            warn!(channel = %kind, error = %e, "Alert channel failed");
            metrics::counter!("alert_channel_failures", "channel" => kind.as_str()).increment(1);
            false
        }
    }
}

fn record_outcome(channel: Option<Channel>) {
    let outcome = channel.map_or("undelivered", Channel::as_str);
    metrics::counter!("alert_dispatches", "outcome" => outcome).increment(1);
}
