//! `Transport` backed by a blocking ureq agent.
//!
//! Each request runs on tokio's blocking pool. The agent is configured with
//! `http_status_as_error(false)` so 4xx/5xx responses come back as data and
//! status interpretation stays with `NetworkService`.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Method};
use crate::transport::Transport;

#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// Agent with an overall per-request timeout.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }

    fn execute(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let headers = &request.headers;
        let body = request.body.as_deref();
        let content_type = body_content_type(&request);
        let result = match request.method {
            Method::Get => with_headers(agent.get(url), headers).call(),
            Method::Delete => with_headers(agent.delete(url), headers).call(),
            Method::Post => send_with_body(with_headers(agent.post(url), headers), body, content_type),
            Method::Put => send_with_body(with_headers(agent.put(url), headers), body, content_type),
            Method::Patch => send_with_body(with_headers(agent.patch(url), headers), body, content_type),
        };

        let mut response = result.map_err(map_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_vec().map_err(map_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body: Bytes::from(body),
        })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Bodies are JSON; label them unless the request already names a type.
fn body_content_type(request: &HttpRequest) -> Option<&'static str> {
    match (&request.body, request.header("content-type")) {
        (Some(_), None) => Some("application/json"),
        _ => None,
    }
}

fn send_with_body(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<&[u8]>,
    content_type: Option<&str>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let builder = match content_type {
        Some(content_type) => builder.content_type(content_type),
        None => builder,
    };
    match body {
        Some(body) => builder.send(body),
        None => builder.send_empty(),
    }
}

fn map_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            TransportError::NotConnected(err.to_string())
        }
        ureq::Error::Timeout(_) => TransportError::TimedOut,
        ureq::Error::Io(io_err) => match io_err.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable => TransportError::NotConnected(io_err.to_string()),
            io::ErrorKind::TimedOut => TransportError::TimedOut,
            _ => TransportError::Other(io_err.to_string()),
        },
        other => TransportError::Other(other.to_string()),
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending with ureq");
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || Self::execute(&agent, request))
            .await
            .map_err(|e| TransportError::Other(format!("blocking task failed: {e}")))?
    }
}
