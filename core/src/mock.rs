//! In-process transport returning canned results.
//!
//! Each test builds its own `MockTransport`, registers the results it needs
//! and hands it to a `NetworkService`. Every request received is recorded so
//! tests can assert what was (or was not) sent.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Method};
use crate::transport::Transport;

/// Canned result for one method + URL.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(HttpResponse),
    Fail(TransportError),
}

#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<(Method, String), MockReply>>,
    received: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every reply back by `delay`, leaving room to cancel in-flight calls.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Register a response for `method` on the absolute `url`.
    pub fn respond(&self, method: Method, url: impl Into<String>, response: HttpResponse) -> &Self {
        self.register(method, url, MockReply::Respond(response))
    }

    /// Register a transport failure for `method` on the absolute `url`.
    pub fn fail(&self, method: Method, url: impl Into<String>, error: TransportError) -> &Self {
        self.register(method, url, MockReply::Fail(error))
    }

    pub fn register(&self, method: Method, url: impl Into<String>, reply: MockReply) -> &Self {
        self.replies.lock().insert((method, url.into()), reply);
        self
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.received.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.received.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = (request.method, request.url.to_string());
        self.received.lock().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().get(&key).cloned();
        match reply {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(error)) => Err(error),
            None => Err(TransportError::Other(format!(
                "no mock registered for {} {}",
                key.0, key.1
            ))),
        }
    }
}
