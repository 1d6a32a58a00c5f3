//! Dispatching endpoints through a transport and classifying the outcome.
//!
//! # Design
//! Every public entry point funnels into `dispatch`, which builds the request
//! on the caller's thread, then spawns one tokio task that races the
//! transport against the call's cancellation token, runs `check_response` and
//! invokes the completion exactly once. `request` layers decoding on top of
//! that, and `publisher`/`fetch` adapt `request` into a single-item stream and
//! a future.
//!
//! The accepted status set and the decoder are cloned into each call when it
//! is dispatched, so reconfiguring a service never affects calls in flight.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::codec::JsonDecoder;
use crate::config::ServiceConfig;
use crate::endpoint::Endpoint;
use crate::error::{NetworkError, TransportError};
use crate::http::HttpResponse;
use crate::kind::EndpointKind;
use crate::publisher::Publisher;
use crate::status::{AcceptedStatus, HttpStatusCode};
use crate::transport::Transport;

/// Classify a transport outcome into the response body or a `NetworkError`.
///
/// Connectivity and cancellation failures get their own variants, a status
/// outside `accepted` is `ServerSideError`, and an accepted response without
/// a body is `EmptyData`.
pub fn check_response(
    outcome: Result<HttpResponse, TransportError>,
    accepted: &AcceptedStatus,
) -> Result<Bytes, NetworkError> {
    let response = outcome.map_err(NetworkError::from)?;
    let status = HttpStatusCode(response.status);
    if !accepted.is_accepted(status) {
        return Err(NetworkError::ServerSideError(status));
    }
    if response.body.is_empty() {
        return Err(NetworkError::EmptyData);
    }
    Ok(response.body)
}

fn decode_body<T: DeserializeOwned>(decoder: &JsonDecoder, body: &[u8]) -> Result<T, NetworkError> {
    decoder
        .decode(body)
        .map_err(|err| NetworkError::Parse(Some(err)))
}

/// Handle to one dispatched call.
///
/// Dropping the handle leaves the call running.
#[derive(Debug)]
pub struct TaskHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl TaskHandle {
    /// Cancel the call. If it has not completed yet its completion receives
    /// `NetworkError::Cancelled`; otherwise this does nothing.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the completion has run. A panic in the completion is
    /// resumed on the caller.
    pub async fn finished(self) {
        if let Err(err) = self.task.await {
            if err.is_panic() {
                std::panic::resume_unwind(err.into_panic());
            }
        }
    }
}

/// Sends endpoints to one host through a `Transport`.
///
/// Must be used from within a tokio runtime: each call runs on a spawned task.
pub struct NetworkService {
    transport: Arc<dyn Transport>,
    config: ServiceConfig,
    accepted: AcceptedStatus,
    decoder: JsonDecoder,
}

impl NetworkService {
    pub fn new(host: impl Into<String>, transport: impl Transport) -> Self {
        Self::with_config(ServiceConfig::new(host), transport)
    }

    pub fn with_config(config: ServiceConfig, transport: impl Transport) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
            accepted: AcceptedStatus::default(),
            decoder: JsonDecoder::default(),
        }
    }

    /// Treat exactly `codes` as successful for calls dispatched from now on.
    pub fn accept(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.accepted = AcceptedStatus::only(codes);
        self
    }

    /// Decoder used by `request`, `publisher` and `fetch`.
    pub fn with_decoder(mut self, decoder: JsonDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn accepted_status(&self) -> &AcceptedStatus {
        &self.accepted
    }

    pub fn decoder(&self) -> &JsonDecoder {
        &self.decoder
    }

    /// Send `endpoint` and deliver the raw body without decoding it.
    ///
    /// Returns `None` when the endpoint cannot be built; `on_complete` has
    /// then already been called with `InvalidEndpoint` and nothing was sent.
    pub fn data_task<K, F>(
        &self,
        endpoint: &Endpoint<K>,
        data: &K::RequestData,
        on_complete: F,
    ) -> Option<TaskHandle>
    where
        K: EndpointKind,
        F: FnOnce(Result<Bytes, NetworkError>) + Send + 'static,
    {
        self.dispatch(endpoint, data, on_complete)
    }

    /// Send `endpoint` and decode the body into `T` with the service decoder.
    pub fn request<K, T, F>(
        &self,
        endpoint: &Endpoint<K>,
        data: &K::RequestData,
        on_complete: F,
    ) -> Option<TaskHandle>
    where
        K: EndpointKind,
        T: DeserializeOwned,
        F: FnOnce(Result<T, NetworkError>) + Send + 'static,
    {
        self.request_with_decoder(endpoint, data, self.decoder.clone(), on_complete)
    }

    /// Like `request`, decoding with `decoder` for this call only.
    pub fn request_with_decoder<K, T, F>(
        &self,
        endpoint: &Endpoint<K>,
        data: &K::RequestData,
        decoder: JsonDecoder,
        on_complete: F,
    ) -> Option<TaskHandle>
    where
        K: EndpointKind,
        T: DeserializeOwned,
        F: FnOnce(Result<T, NetworkError>) + Send + 'static,
    {
        self.dispatch(endpoint, data, move |outcome| {
            on_complete(outcome.and_then(|body| decode_body(&decoder, &body)));
        })
    }

    /// Send `endpoint` and expose the decoded result as a stream that yields
    /// exactly one item, then ends.
    ///
    /// The item is delivered on whichever task polls the stream. Dropping the
    /// stream before it yields cancels the call.
    pub fn publisher<K, T>(&self, endpoint: &Endpoint<K>, data: &K::RequestData) -> Publisher<T>
    where
        K: EndpointKind,
        T: DeserializeOwned + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let handle = self.request(endpoint, data, move |result| {
            let _ = sender.send(result);
        });
        Publisher::new(receiver, handle)
    }

    /// Send `endpoint` and await the decoded result.
    ///
    /// The call is dispatched immediately; the returned future only waits.
    pub fn fetch<K, T>(
        &self,
        endpoint: &Endpoint<K>,
        data: &K::RequestData,
    ) -> impl Future<Output = Result<T, NetworkError>> + Send + 'static
    where
        K: EndpointKind,
        T: DeserializeOwned + Send + 'static,
    {
        let mut publisher = self.publisher(endpoint, data);
        async move {
            publisher
                .next()
                .await
                .unwrap_or(Err(NetworkError::Cancelled))
        }
    }

    fn dispatch<K, F>(
        &self,
        endpoint: &Endpoint<K>,
        data: &K::RequestData,
        on_complete: F,
    ) -> Option<TaskHandle>
    where
        K: EndpointKind,
        F: FnOnce(Result<Bytes, NetworkError>) + Send + 'static,
    {
        let request = match endpoint.build_request(&self.config, data) {
            Ok(request) => request,
            Err(err) => {
                debug!(path = endpoint.path(), host = %self.config.host, "endpoint rejected");
                on_complete(Err(err));
                return None;
            }
        };

        let transport = Arc::clone(&self.transport);
        let accepted = self.accepted.clone();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let method = request.method;
        let url = request.url.clone();
        debug!(%method, %url, "dispatching request");

        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancelled.cancelled() => Err(TransportError::Cancelled),
                result = transport.send(request) => result,
            };
            if let Ok(response) = &outcome {
                debug!(%method, %url, status = response.status, "response received");
            }
            let result = check_response(outcome, &accepted);
            if let Err(err) = &result {
                debug!(%method, %url, error = %err, "request failed");
            }
            on_complete(result);
        });

        Some(TaskHandle { token, task })
    }
}
