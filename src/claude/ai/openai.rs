//! OpenAI-compatible API client implementation (works with OpenAI, Ollama, etc.)

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    build_http_client, check_error_response, log_response_success, AiClient, AiClientMetadata,
    DEFAULT_MAX_TOKENS,
};
use crate::claude::error::ClaudeError;

/// Public OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default local Ollama endpoint.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAiResponse {
    choices: Vec<Choice>,
    model: Option<String>,
}

/// OpenAI-compatible API client (works with OpenAI, Ollama, etc.)
pub struct OpenAiAiClient {
    client: Client,
    /// Optional for Ollama.
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl OpenAiAiClient {
    /// Create a new OpenAI-compatible API client
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: String,
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens,
            temperature,
        })
    }

    /// Create a new client for Ollama with sensible defaults
    pub fn new_ollama(model: String, base_url: Option<String>) -> Result<Self> {
        Self::new(
            model,
            None,
            base_url.unwrap_or_else(|| OLLAMA_BASE_URL.to_string()),
            4_096,
            Some(0.1),
        )
    }

    /// Create a new client for OpenAI with sensible defaults
    pub fn new_openai(model: String, api_key: String) -> Result<Self> {
        Self::new(
            model,
            Some(api_key),
            OPENAI_BASE_URL.to_string(),
            DEFAULT_MAX_TOKENS,
            Some(0.1),
        )
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn is_ollama(&self) -> bool {
        self.api_key.is_none()
    }

    /// GPT-5 and o-series models take `max_completion_tokens` and only the
    /// default temperature.
    fn is_reasoning_model(&self) -> bool {
        self.model.starts_with("gpt-5") || self.model.starts_with("o1")
    }

    fn build_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> OpenAiRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(Message {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(Message {
            role: "user",
            content: user_prompt,
        });

        if self.is_reasoning_model() {
            OpenAiRequest {
                model: &self.model,
                messages,
                max_tokens: None,
                max_completion_tokens: Some(self.max_tokens),
                temperature: None,
                stream: false,
            }
        } else {
            OpenAiRequest {
                model: &self.model,
                messages,
                max_tokens: Some(self.max_tokens),
                max_completion_tokens: None,
                temperature: self.temperature,
                stream: false,
            }
        }
    }
}

impl AiClient for OpenAiAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let request = self.build_request(system_prompt, user_prompt);
            debug!(
                model = %self.model,
                base_url = %self.base_url,
                is_ollama = self.is_ollama(),
                message_count = request.messages.len(),
                "Built OpenAI-compatible request payload"
            );

            let url = self.chat_url();
            info!(url = %url, model = %self.model, "Sending request to OpenAI-compatible API");

            let mut builder = self.client.post(&url).json(&request);
            if let Some(ref api_key) = self.api_key {
                builder = builder.bearer_auth(api_key);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| ClaudeError::NetworkError(e.to_string()))?;
            let response = check_error_response(response).await?;

            let openai_response: OpenAiResponse = response
                .json()
                .await
                .map_err(|e| ClaudeError::InvalidResponseFormat(e.to_string()))?;

            debug!(
                choice_count = openai_response.choices.len(),
                model = ?openai_response.model,
                "Received OpenAI-compatible API response"
            );

            let result = openai_response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| {
                    ClaudeError::InvalidResponseFormat("No choices in response".to_string()).into()
                });

            log_response_success("OpenAI-compatible", &result);
            result
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        let provider = if self.is_ollama() { "Ollama" } else { "OpenAI" };
        AiClientMetadata {
            provider: provider.to_string(),
            model: self.model.clone(),
            max_response_length: self.max_tokens,
        }
    }
}
