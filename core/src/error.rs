//! Error types for the request pipeline.
//!
//! # Design
//! `NetworkError` is the closed set of outcomes a caller can see besides
//! success. Transports report their own `TransportError`; the service maps
//! the connectivity and cancellation cases onto dedicated variants and wraps
//! everything else in `Generic`. Payloads are owned strings so errors can be
//! cloned out of canned mock results.

use thiserror::Error;

use crate::status::HttpStatusCode;

/// Failure reported by a `Transport` before any HTTP status is available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The host could not be reached at all.
    #[error("not connected: {0}")]
    NotConnected(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out")]
    TimedOut,

    #[error("transport failure: {0}")]
    Other(String),
}

/// Errors delivered by `NetworkService`.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The endpoint could not be assembled into a valid URL. No request was sent.
    #[error("invalid endpoint")]
    InvalidEndpoint,

    #[error("not connected to the internet")]
    NotConnectedToInternet,

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Generic(TransportError),

    /// The response status was not in the accepted set. Covers any rejected
    /// status, not only 5xx.
    #[error("server responded with status {0}")]
    ServerSideError(HttpStatusCode),

    /// Accepted status, but the body was missing or empty.
    #[error("response body is empty")]
    EmptyData,

    #[error("failed to decode response body")]
    Parse(#[source] Option<serde_json::Error>),
}

impl NetworkError {
    /// The rejected status code, if this is a status error.
    pub fn status_code(&self) -> Option<HttpStatusCode> {
        match self {
            NetworkError::ServerSideError(status) => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetworkError::Cancelled)
    }
}

impl From<TransportError> for NetworkError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotConnected(_) => NetworkError::NotConnectedToInternet,
            TransportError::Cancelled => NetworkError::Cancelled,
            other => NetworkError::Generic(other),
        }
    }
}
