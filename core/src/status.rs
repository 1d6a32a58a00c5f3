//! Status-code classification and the accepted-status policy.

use std::collections::BTreeSet;
use std::fmt;

/// Semantic band of an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
    Undefined,
}

/// An HTTP status code as returned by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HttpStatusCode(pub u16);

impl HttpStatusCode {
    pub const CONTINUE: Self = Self(100);
    pub const OK: Self = Self(200);
    pub const CREATED: Self = Self(201);
    pub const ACCEPTED: Self = Self(202);
    pub const NO_CONTENT: Self = Self(204);
    pub const MOVED_PERMANENTLY: Self = Self(301);
    pub const FOUND: Self = Self(302);
    pub const NOT_MODIFIED: Self = Self(304);
    pub const BAD_REQUEST: Self = Self(400);
    pub const UNAUTHORIZED: Self = Self(401);
    pub const FORBIDDEN: Self = Self(403);
    pub const NOT_FOUND: Self = Self(404);
    pub const CONFLICT: Self = Self(409);
    pub const UNPROCESSABLE_ENTITY: Self = Self(422);
    pub const TOO_MANY_REQUESTS: Self = Self(429);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);
    pub const BAD_GATEWAY: Self = Self(502);
    pub const SERVICE_UNAVAILABLE: Self = Self(503);
    pub const GATEWAY_TIMEOUT: Self = Self(504);

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn response_type(self) -> ResponseType {
        match self.0 {
            100..=199 => ResponseType::Informational,
            200..=299 => ResponseType::Success,
            300..=399 => ResponseType::Redirection,
            400..=499 => ResponseType::ClientError,
            500..=599 => ResponseType::ServerError,
            _ => ResponseType::Undefined,
        }
    }
}

impl From<u16> for HttpStatusCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which status codes a service treats as successful.
///
/// Defaults to the whole success band. After `NetworkService::accept` only
/// the listed codes are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AcceptedStatus {
    #[default]
    SuccessClass,
    Only(BTreeSet<u16>),
}

impl AcceptedStatus {
    pub fn only(codes: impl IntoIterator<Item = u16>) -> Self {
        AcceptedStatus::Only(codes.into_iter().collect())
    }

    pub fn is_accepted(&self, code: HttpStatusCode) -> bool {
        match self {
            AcceptedStatus::SuccessClass => code.response_type() == ResponseType::Success,
            AcceptedStatus::Only(codes) => codes.contains(&code.as_u16()),
        }
    }
}
