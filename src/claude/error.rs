//! AI transport and reply errors.

use thiserror::Error;

/// AI API specific errors.
#[derive(Error, Debug)]
pub enum ClaudeError {
    /// API key not found in environment variables.
    #[error(
        "Claude API key not found. Set CLAUDE_API_KEY or ANTHROPIC_API_KEY environment variable"
    )]
    ApiKeyNotFound,

    /// API request failed with error message.
    #[error("AI API request failed: {0}")]
    ApiRequestFailed(String),

    /// Invalid response format from the API.
    #[error("Invalid response format from AI API: {0}")]
    InvalidResponseFormat(String),

    /// The reply did not contain a usable commit plan.
    #[error("Failed to parse commit plan from AI response: {0}")]
    PlanParsingFailed(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please try again later")]
    RateLimitExceeded,

    /// Network connectivity error.
    #[error("Network error: {0}")]
    NetworkError(String),
}
