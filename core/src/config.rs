//! Service configuration.

use serde::{Deserialize, Serialize};

fn default_scheme() -> String {
    "https".to_string()
}

/// Where a `NetworkService` sends its requests.
///
/// Deserializable so it can be embedded in an application's own config file;
/// `scheme` defaults to `https`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Host with an optional port, without scheme or path.
    pub host: String,
}

impl ServiceConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            scheme: default_scheme(),
            host: host.into(),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }
}
