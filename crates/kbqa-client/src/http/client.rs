//! HTTP client struct, request sending and error mapping.

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::ClientError;

use super::config::HttpConfig;

/// Longest server error body kept in `ClientError::Api`.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Knowledge-base server client.
pub struct HttpKbClient {
    pub(crate) config: HttpConfig,
    pub(crate) http: reqwest::Client,
}

impl HttpKbClient {
    pub fn new(config: HttpConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_root, path)
    }

    /// Send a JSON request with the request timeout and decode the body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Send a JSON request whose response body is ignored.
    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await
    }
}

impl std::fmt::Debug for HttpKbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpKbClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Turn a non-success status into `ClientError::Api`.
pub(crate) async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = error_message(&text);
    debug!(status = status.as_u16(), message = %message, "server returned error");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// The server's `detail` field when the body carries one, else the raw body,
/// truncated either way.
pub(crate) fn error_message(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("detail").and_then(|d| d.as_str()).map(str::to_string));
    let message = detail.unwrap_or_else(|| body.trim().to_string());
    message.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

pub(crate) fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else if e.is_decode() {
        ClientError::Parse(e.to_string())
    } else {
        ClientError::Network(e.to_string())
    }
}
