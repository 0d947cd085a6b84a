//! AI client trait and shared HTTP helpers.

pub mod claude;
pub mod openai;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::claude::error::ClaudeError;

/// HTTP request timeout for AI API calls.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Output token limit used when a client is not told otherwise.
pub(crate) const DEFAULT_MAX_TOKENS: u32 = 8_192;

/// Identifies the provider and model behind a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AiClientMetadata {
    /// Service provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Maximum token response length requested.
    pub max_response_length: u32,
}

/// Builds an HTTP client with the standard request timeout.
pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Passes successful responses through; turns error statuses into
/// [`ClaudeError`] values carrying the response body.
pub(crate) async fn check_error_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ClaudeError::RateLimitExceeded.into());
    }
    let error_text = response.text().await.unwrap_or_else(|e| {
        tracing::debug!("Failed to read error response body: {e}");
        String::new()
    });
    Err(ClaudeError::ApiRequestFailed(format!("HTTP {status}: {error_text}")).into())
}

/// Records the size of a reply, and its text at trace level.
pub(crate) fn log_response_success(provider: &str, result: &Result<String>) {
    if let Ok(text) = result {
        tracing::debug!(
            response_len = text.len(),
            "Successfully extracted text content from {} API response",
            provider
        );
        tracing::trace!(response_content = %text, "{} API response content", provider);
    }
}

/// A chat-style model endpoint that answers one prompt pair with text.
pub trait AiClient: Send + Sync {
    /// Sends a request to the AI service and returns the raw text reply.
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Provider and model this client talks to.
    fn get_metadata(&self) -> AiClientMetadata;
}
