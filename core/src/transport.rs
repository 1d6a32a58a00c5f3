//! The network capability `NetworkService` depends on.
//!
//! # Design
//! The service never talks to a concrete HTTP client. Anything that can turn
//! an `HttpRequest` into an `HttpResponse` can be plugged in: the blocking
//! ureq agent in `blocking`, the in-process `MockTransport` used by tests, or
//! an application's own client. Cancellation is handled by the service, which
//! drops the `send` future; implementations only need to be drop-safe.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Execute `request` and return whatever the server answered, including
    /// non-2xx statuses. Only failures to obtain a response are errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}
