//! The HTTP seam shared by the Slack and email senders.

use super::ChannelError;
use async_trait::async_trait;
use serde_json::Value;

/// A JSON POST request, built fresh for every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl OutboundRequest {
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            headers: vec![("Content-Type", "application/json".to_string())],
            body,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// The parts of an HTTP response the senders look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            reason,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a JSON POST and returns the response, whatever its status.
///
/// Only failures to get a response at all are errors; status handling is
/// left to the caller. Implementations must be cancel-safe, since a
/// timed-out request is dropped mid-flight.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, request: &OutboundRequest) -> Result<HttpResponse, ChannelError>;
}

/// The production transport, backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, request: &OutboundRequest) -> Result<HttpResponse, ChannelError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.json(&request.body).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}
