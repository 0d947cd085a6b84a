//! AI integration for commit plan generation.

pub mod ai;
pub mod client;
pub mod error;
pub mod prompts;
#[cfg(test)]
pub(crate) mod test_utils;

pub use ai::claude::ClaudeAiClient;
pub use ai::openai::OpenAiAiClient;
pub use ai::{AiClient, AiClientMetadata};
pub use client::{create_default_plan_generator, AiPlanGenerator};
pub use error::ClaudeError;
