//! Declarative HTTP endpoints dispatched through a pluggable transport.
//!
//! # Overview
//! An [`Endpoint`] describes one logical API call: path, method, query items
//! and JSON body parameters. Its kind ([`Public`], [`Authenticated`], or an
//! application's own [`EndpointKind`]) defines the per-call data the request
//! needs, such as a bearer token. A [`NetworkService`] builds the request,
//! sends it through a [`Transport`], classifies the outcome into a
//! [`NetworkError`] or a body, and decodes that body into the caller's type.
//!
//! # Design
//! - Request building is pure and fails with `InvalidEndpoint` instead of
//!   producing a malformed URL; no transport call happens in that case.
//! - One classification path (`check_response`) serves the callback API
//!   (`data_task`, `request`), the single-item stream (`publisher`) and the
//!   future (`fetch`).
//! - Transports are injected, so tests use a per-test [`MockTransport`]
//!   instead of any process-wide interception.
//! - Accepted statuses and the decoder are snapshotted per call.

pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod kind;
pub mod mock;
pub mod publisher;
pub mod service;
pub mod status;
pub mod transport;

#[cfg(feature = "ureq")]
pub mod blocking;

pub use codec::{Date, DateStrategy, JsonDecoder, JsonEncoder};
pub use config::ServiceConfig;
pub use endpoint::{Endpoint, QueryItem};
pub use error::{NetworkError, TransportError};
pub use http::{HttpRequest, HttpResponse, Method};
pub use kind::{Authenticated, EndpointKind, Public};
pub use mock::{MockReply, MockTransport};
pub use publisher::Publisher;
pub use service::{check_response, NetworkService, TaskHandle};
pub use status::{AcceptedStatus, HttpStatusCode, ResponseType};
pub use transport::Transport;

#[cfg(feature = "ureq")]
pub use blocking::UreqTransport;
