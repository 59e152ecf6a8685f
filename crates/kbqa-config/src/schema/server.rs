use serde::{Deserialize, Serialize};

/// Where the knowledge-base server lives and how long to wait on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Scheme, host and port of the server (no trailing path).
    pub base_url: String,
    /// Path prefix all API routes hang off.
    pub api_prefix: String,
    /// TCP connect timeout in seconds (valid range: 1-600).
    pub connect_timeout_secs: u32,
    /// Whole-request timeout for plain JSON calls in seconds (valid range: 1-600).
    /// The ask stream is never subject to it.
    pub request_timeout_secs: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            api_prefix: "/api".into(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Base URL joined with the API prefix, without a trailing slash.
    pub fn api_root(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{prefix}")
        }
    }
}
