//! Canned-response HTTP server for integration tests.
//!
//! # Design
//! A `MockServer` owns its own table of `Mock`s keyed by method and
//! path-with-query. Every request lands in a single fallback handler that
//! records it and answers with the matching mock, or 404 when none matches.
//! Tests create one server each; nothing is shared between instances.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, warn};

/// One canned response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Mock {
    pub method: String,
    /// Path including the query string, e.g. `/search?q=rust`.
    pub path: String,
    pub status: u16,
    /// JSON body; absent means an empty body.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl Mock {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            status: 200,
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: &str) -> Self {
        Self::new("POST", path)
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A request as the server received it.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

type MockTable = Arc<RwLock<HashMap<(String, String), Mock>>>;

#[derive(Clone, Default)]
pub struct MockServer {
    mocks: MockTable,
    received: Arc<RwLock<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, mock: Mock) {
        let key = (mock.method.clone(), mock.path.clone());
        self.mocks.write().await.insert(key, mock);
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.received.read().await.clone()
    }
}

pub fn app(server: MockServer) -> Router {
    Router::new().fallback(respond).with_state(server)
}

pub async fn run(listener: TcpListener, server: MockServer) -> Result<(), std::io::Error> {
    axum::serve(listener, app(server)).await
}

async fn respond(
    State(server): State<MockServer>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    server.received.write().await.push(RecordedRequest {
        method: method.to_string(),
        path: path.clone(),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect(),
        body,
    });

    let key = (method.to_string(), path);
    let mock = server.mocks.read().await.get(&key).cloned();
    let Some(mock) = mock else {
        warn!(method = %key.0, path = %key.1, "no mock registered");
        return (StatusCode::NOT_FOUND, format!("no mock for {} {}", key.0, key.1)).into_response();
    };

    debug!(method = %key.0, path = %key.1, status = mock.status, "serving mock");
    let status = StatusCode::from_u16(mock.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match mock.body {
        Some(body) => (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response(),
        None => status.into_response(),
    }
}
