//! The "send with timeout and a single retry" routine used by every channel.

use super::transport::{HttpResponse, HttpTransport, OutboundRequest};
use super::{Channel, ChannelError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// The timeout window applied to each attempt unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The first attempt plus one retry after a timeout.
pub const MAX_ATTEMPTS: u32 = 2;

/// Sends a request built by `build`, classifying the response with `classify`.
///
/// Every attempt gets its own `window`. When the window elapses the in-flight
/// request is dropped and a fresh one is sent, once. A second timeout is
/// final. Any other error, and any response, ends the routine immediately.
pub async fn send_with_retry<B, C>(
    transport: &dyn HttpTransport,
    channel: Channel,
    window: Duration,
    build: B,
    classify: C,
) -> Result<(), ChannelError>
where
    B: Fn() -> OutboundRequest,
    C: Fn(HttpResponse) -> Result<(), ChannelError>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let request = build();
        debug!(%channel, attempt, "Sending alert request");

        match timeout(window, transport.post_json(&request)).await {
            Ok(Ok(response)) => return classify(response),
            Ok(Err(e)) => return Err(e),
            Err(_) if attempt < MAX_ATTEMPTS => {
                warn!(%channel, attempt, ?window, "Alert request timed out, retrying");
            }
            Err(_) => {}
        }
    }

    error!(%channel, attempts = MAX_ATTEMPTS, ?window, "Alert request timed out on retry");
    Err(ChannelError::TimedOut {
        attempts: MAX_ATTEMPTS,
        window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Each call pops the next scripted step: a delay before answering and
    /// the answer itself.
    struct ScriptedTransport {
        steps: Mutex<Vec<(Duration, Result<u16, String>)>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(mut steps: Vec<(Duration, Result<u16, String>)>) -> Self {
            steps.reverse();
            Self {
                steps: Mutex::new(steps),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn post_json(&self, _request: &OutboundRequest) -> Result<HttpResponse, ChannelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, outcome) = self
                .steps
                .lock()
                .unwrap()
                .pop()
                .expect("unexpected extra request");
            tokio::time::sleep(delay).await;
            outcome
                .map(|status| HttpResponse::new(status, ""))
                .map_err(ChannelError::Network)
        }
    }

    fn build() -> OutboundRequest {
        OutboundRequest::new("http://hooks.test/alert", json!({ "text": "hi" }))
    }

    fn classify(response: HttpResponse) -> Result<(), ChannelError> {
        if response.is_success() {
            Ok(())
        } else {
            Err(ChannelError::SlackRejected {
                status: response.status,
                reason: response.reason,
            })
        }
    }

    const SLOW: Duration = Duration::from_secs(11);
    const FAST: Duration = Duration::from_millis(5);

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let transport = ScriptedTransport::new(vec![(FAST, Ok(200))]);
        let result = send_with_retry(&transport, Channel::Slack, DEFAULT_TIMEOUT, build, classify).await;
        assert!(result.is_ok());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success() {
        let transport = ScriptedTransport::new(vec![(SLOW, Ok(200)), (FAST, Ok(200))]);
        let result = send_with_retry(&transport, Channel::Slack, DEFAULT_TIMEOUT, build, classify).await;
        assert!(result.is_ok());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_timeout_is_final() {
        let transport = ScriptedTransport::new(vec![(SLOW, Ok(200)), (SLOW, Ok(200))]);
        let result = send_with_retry(&transport, Channel::Email, DEFAULT_TIMEOUT, build, classify).await;
        assert!(matches!(
            result,
            Err(ChannelError::TimedOut { attempts: 2, .. })
        ));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_rejection_fails() {
        let transport = ScriptedTransport::new(vec![(SLOW, Ok(200)), (FAST, Ok(500))]);
        let result = send_with_retry(&transport, Channel::Slack, DEFAULT_TIMEOUT, build, classify).await;
        assert!(matches!(
            result,
            Err(ChannelError::SlackRejected { status: 500, .. })
        ));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_is_not_retried() {
        let transport = ScriptedTransport::new(vec![(FAST, Ok(404))]);
        let result = send_with_retry(&transport, Channel::Slack, DEFAULT_TIMEOUT, build, classify).await;
        assert!(matches!(
            result,
            Err(ChannelError::SlackRejected { status: 404, .. })
        ));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![(FAST, Err("connection refused".into()))]);
        let result = send_with_retry(&transport, Channel::Slack, DEFAULT_TIMEOUT, build, classify).await;
        assert!(matches!(result, Err(ChannelError::Network(_))));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_gets_a_fresh_window() {
        // The retry takes 9s, which only fits a fresh 10s window.
        let nine = Duration::from_secs(9);
        let transport = ScriptedTransport::new(vec![(SLOW, Ok(200)), (nine, Ok(200))]);
        let result = send_with_retry(&transport, Channel::Slack, DEFAULT_TIMEOUT, build, classify).await;
        assert!(result.is_ok());
    }
}
