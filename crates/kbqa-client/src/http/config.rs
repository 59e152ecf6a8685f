//! HTTP client configuration.

use std::time::Duration;

/// Connection settings for [`HttpKbClient`](super::HttpKbClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Base URL plus API prefix, e.g. `http://127.0.0.1:8000/api`.
    pub api_root: String,
    pub connect_timeout: Duration,
    /// Whole-request timeout for JSON endpoints. Never applied to the ask
    /// stream, which stays open for as long as the answer takes.
    pub request_timeout: Duration,
}

impl HttpConfig {
    pub fn new(api_root: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into().trim_end_matches('/').to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8000/api")
    }
}
