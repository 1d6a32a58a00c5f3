//! Endpoint kinds: the per-call data an endpoint needs and how it is applied.

use crate::http::HttpRequest;

/// Capability tag carried by an `Endpoint`.
///
/// `prepare` runs after the request has been otherwise fully built, so it has
/// the final say over headers.
pub trait EndpointKind {
    type RequestData;

    fn prepare(request: &mut HttpRequest, data: &Self::RequestData);
}

/// Endpoints that need no auxiliary data.
#[derive(Debug, Clone, Copy)]
pub enum Public {}

impl EndpointKind for Public {
    type RequestData = ();

    fn prepare(_request: &mut HttpRequest, _data: &()) {}
}

/// Endpoints that require a bearer token.
#[derive(Debug, Clone, Copy)]
pub enum Authenticated {}

impl EndpointKind for Authenticated {
    type RequestData = String;

    fn prepare(request: &mut HttpRequest, token: &String) {
        request.set_header("Authorization", format!("Bearer {token}"));
    }
}
