//! Declarative endpoint descriptions and request building.
//!
//! # Design
//! An `Endpoint` is built once per call site and never mutated afterwards;
//! every `with_*` method consumes and returns it. `build_request` is a pure
//! transformation from endpoint + service config + per-call data into an
//! `HttpRequest`, in this order:
//!
//! 1. assemble and validate the URL (failure is `InvalidEndpoint`)
//! 2. apply the method and static headers
//! 3. attach the JSON body for POST, PUT and PATCH
//! 4. hand the request to the kind's `prepare` hook

use std::fmt;
use std::marker::PhantomData;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use crate::config::ServiceConfig;
use crate::error::NetworkError;
use crate::http::{HttpRequest, Method};
use crate::kind::EndpointKind;

/// Bytes left unescaped inside a query name or value: RFC 3986 unreserved
/// characters plus the sub-delimiters that carry no meaning in a query
/// component. `&`, `=`, `+` and `'` are always escaped.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b',')
    .remove(b';')
    .remove(b':')
    .remove(b'@')
    .remove(b'/')
    .remove(b'?');

/// One `name[=value]` pair of a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryItem {
    pub name: String,
    pub value: Option<String>,
}

impl QueryItem {
    pub fn new(name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            value: value.map(Into::into),
        }
    }

    fn encode(&self) -> String {
        let name = utf8_percent_encode(&self.name, QUERY_COMPONENT);
        match &self.value {
            Some(value) => format!("{name}={}", utf8_percent_encode(value, QUERY_COMPONENT)),
            None => name.to_string(),
        }
    }
}

/// Description of one logical API call.
pub struct Endpoint<K: EndpointKind> {
    path: String,
    method: Method,
    query_items: Vec<QueryItem>,
    body_parameters: Map<String, Value>,
    headers: Vec<(String, String)>,
    kind: PhantomData<fn() -> K>,
}

impl<K: EndpointKind> Endpoint<K> {
    /// A GET endpoint at `path`. The path must start with `/`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::Get,
            query_items: Vec::new(),
            body_parameters: Map::new(),
            headers: Vec::new(),
            kind: PhantomData,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_items.push(QueryItem::new(name, Some(value)));
        self
    }

    /// Adds a query item without a value (`?name`).
    pub fn with_query_flag(mut self, name: impl Into<String>) -> Self {
        self.query_items.push(QueryItem::new(name, None::<String>));
        self
    }

    pub fn with_query_items(mut self, items: impl IntoIterator<Item = QueryItem>) -> Self {
        self.query_items.extend(items);
        self
    }

    pub fn with_body_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body_parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_body_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.body_parameters.extend(parameters);
        self
    }

    /// A header sent with every request built from this endpoint. The kind's
    /// `prepare` hook can still override it.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn query_items(&self) -> &[QueryItem] {
        &self.query_items
    }

    pub fn body_parameters(&self) -> &Map<String, Value> {
        &self.body_parameters
    }

    /// Build a transport-ready request against `config`'s scheme and host.
    pub fn build_request(
        &self,
        config: &ServiceConfig,
        data: &K::RequestData,
    ) -> Result<HttpRequest, NetworkError> {
        let url = self.url(config)?;
        let mut request = HttpRequest::new(url, self.method);

        for (name, value) in &self.headers {
            request.set_header(name.as_str(), value.as_str());
        }

        if self.method.carries_body() {
            match serde_json::to_vec(&self.body_parameters) {
                Ok(body) => request.body = Some(body),
                Err(err) => {
                    warn!(path = %self.path, error = %err, "body parameters not serializable, sending without body");
                }
            }
        }

        K::prepare(&mut request, data);
        Ok(request)
    }

    fn url(&self, config: &ServiceConfig) -> Result<Url, NetworkError> {
        if config.host.is_empty() || !(self.path.is_empty() || self.path.starts_with('/')) {
            return Err(NetworkError::InvalidEndpoint);
        }

        let mut url = Url::parse(&format!("{}://{}", config.scheme, config.host))
            .map_err(|_| NetworkError::InvalidEndpoint)?;

        // The host must be a bare authority; anything that parsed into a path,
        // query, fragment or credentials is rejected.
        let bare = url.has_host()
            && url.path() == "/"
            && url.query().is_none()
            && url.fragment().is_none()
            && url.username().is_empty()
            && url.password().is_none();
        if !bare {
            return Err(NetworkError::InvalidEndpoint);
        }

        url.set_path(&self.path);
        if !self.query_items.is_empty() {
            let query = self
                .query_items
                .iter()
                .map(QueryItem::encode)
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
        Ok(url)
    }
}

impl<K: EndpointKind> Clone for Endpoint<K> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            method: self.method,
            query_items: self.query_items.clone(),
            body_parameters: self.body_parameters.clone(),
            headers: self.headers.clone(),
            kind: PhantomData,
        }
    }
}

impl<K: EndpointKind> fmt::Debug for Endpoint<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("query_items", &self.query_items)
            .field("body_parameters", &self.body_parameters)
            .field("headers", &self.headers)
            .finish()
    }
}
