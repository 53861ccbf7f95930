//! HTTP utilities for provider gateway calls

use super::accounts::CredentialHandle;
use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::fmt;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Non-success HTTP status returned by the gateway.
///
/// Carried inside `anyhow::Error` so callers can `downcast_ref` it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiStatusError {
    pub status: u16,
}

impl fmt::Display for ApiStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API request failed: {}", self.status)
    }
}

impl std::error::Error for ApiStatusError {}

/// Returns the HTTP status if the error chain contains an [`ApiStatusError`].
pub fn api_status(error: &anyhow::Error) -> Option<u16> {
    error
        .chain()
        .find_map(|e| e.downcast_ref::<ApiStatusError>())
        .map(|e| e.status)
}

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for gateway calls
#[derive(Clone)]
pub struct ProviderHttpClient {
    client: Client,
}

impl ProviderHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cost-saver/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    fn authorize(&self, request: RequestBuilder, credentials: &CredentialHandle) -> RequestBuilder {
        request.basic_auth(
            credentials.access_key_id(),
            Some(credentials.secret_access_key()),
        )
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, credentials: &CredentialHandle) -> Result<Value> {
        tracing::debug!("GET {}", url);

        let request = self.authorize(self.client.get(url), credentials);
        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }

    /// Make a POST request with an optional JSON body
    pub async fn post(
        &self,
        url: &str,
        credentials: &CredentialHandle,
        body: Option<&Value>,
    ) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let mut request = self.authorize(self.client.post(url), credentials);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, credentials: &CredentialHandle) -> Result<Value> {
        tracing::debug!("DELETE {}", url);

        let request = self.authorize(self.client.delete(url), credentials);
        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only log sanitized/truncated error body
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiStatusError {
                status: status.as_u16(),
            }
            .into());
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

/// Format a gateway error for display
/// Generic messages keyed on status so provider details are not shown
pub fn format_api_error(error: &anyhow::Error) -> String {
    if let Some(status) = api_status(error) {
        return match status {
            401 => "Authentication failed. Check the account access key.".to_string(),
            403 => "Permission denied. Check the account credentials.".to_string(),
            404 => "Resource not found.".to_string(),
            409 => "Resource conflict. The resource may be changing state.".to_string(),
            429 => "Rate limit exceeded. Please try again later.".to_string(),
            400 => "Invalid request. Check your parameters.".to_string(),
            500..=599 => "Provider temporarily unavailable. Please try again.".to_string(),
            _ => "Request failed. Check your network connection and try again.".to_string(),
        };
    }

    let error_str = error.to_string();
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(80)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
