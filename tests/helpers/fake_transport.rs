//! A scripted HTTP transport for exercising the dispatcher without a network.

use async_trait::async_trait;
use doughwatch::notification::{ChannelError, HttpResponse, HttpTransport, OutboundRequest};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// What the fake does with one request to a given URL.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Answer immediately with this status and body.
    Status(u16, &'static str),
    /// Never answer within any sensible timeout window.
    Hang,
    /// Fail before any response arrives.
    NetworkError,
}

/// Replies are scripted per URL; the last reply for a URL repeats.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, Vec<Reply>>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), replies);
        self
    }

    /// All requests received, in order.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_reply(&self, url: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(replies) if replies.len() > 1 => replies.remove(0),
            Some(replies) if !replies.is_empty() => replies[0].clone(),
            _ => Reply::Status(404, ""),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn post_json(&self, request: &OutboundRequest) -> Result<HttpResponse, ChannelError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.next_reply(&request.url);
        match reply {
            Reply::Status(status, body) => Ok(HttpResponse::new(status, body)),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(HttpResponse::new(200, ""))
            }
            Reply::NetworkError => Err(ChannelError::Network("connection reset".to_string())),
        }
    }
}
