/*
[INPUT]:  HTTP configuration (base URL, timeouts)
[OUTPUT]: Configured reqwest client ready for auth API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing response handling
*/

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::http::{Result, SessionError};
use crate::types::ErrorBody;

/// Default backend for session endpoints
pub const DEFAULT_API_BASE_URL: &str = "https://api.tradelink.app";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the session backend
#[derive(Debug, Clone)]
pub struct AuthClient {
    http_client: Client,
    base_url: Url,
}

impl AuthClient {
    /// Create a new client against the default backend
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default(), DEFAULT_API_BASE_URL)
    }

    /// Create a new client with custom configuration and base URL
    pub fn with_config(config: ClientConfig, base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build request builder for an endpoint relative to the base URL
    pub(crate) fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Send a request and decode a JSON body, mapping error statuses
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "auth request failed");
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|err| {
            SessionError::InvalidResponse(format!("unexpected body for status {status}: {err}"))
        })
    }
}

fn status_error(status: StatusCode, body: &str) -> SessionError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .text()
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    SessionError::api_error(status, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AuthClient::new().unwrap();
        assert_eq!(client.base_url().as_str(), "https://api.tradelink.app/");
    }

    #[test]
    fn test_client_rejects_invalid_base_url() {
        let err = AuthClient::with_config(ClientConfig::default(), "not a url").unwrap_err();
        assert!(matches!(err, SessionError::UrlParse(_)));
    }

    #[test]
    fn test_status_error_prefers_body_message() {
        let err = status_error(StatusCode::UNAUTHORIZED, r#"{"message":"Token expired"}"#);
        assert!(err.is_expiry());

        let err = status_error(StatusCode::BAD_GATEWAY, "<html>");
        match err {
            SessionError::Api { code, message } => {
                assert_eq!(code, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
