//! Model-backed commit plan generation.

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::claude::ai::claude::ClaudeAiClient;
use crate::claude::ai::openai::OpenAiAiClient;
use crate::claude::ai::{AiClient, AiClientMetadata};
use crate::claude::error::ClaudeError;
use crate::claude::prompts;
use crate::data::{extract_yaml_block, from_yaml, CommitPlan, ProposalContext};
use crate::session::PlanGenerator;
use crate::utils::preflight::{check_ai_credentials, AiProvider};
use crate::utils::settings::{get_env_var, get_env_vars};

/// Generates commit plans by asking an AI model.
pub struct AiPlanGenerator {
    ai_client: Box<dyn AiClient>,
}

impl AiPlanGenerator {
    /// Creates a generator backed by `ai_client`.
    pub fn new(ai_client: Box<dyn AiClient>) -> Self {
        Self { ai_client }
    }

    /// Metadata of the underlying client.
    pub fn metadata(&self) -> AiClientMetadata {
        self.ai_client.get_metadata()
    }

    async fn request_plan(&self, context: &ProposalContext) -> Result<CommitPlan> {
        let metadata = self.ai_client.get_metadata();
        let user_prompt = prompts::generate_user_prompt(context);
        info!(
            provider = %metadata.provider,
            model = %metadata.model,
            units = context.unit_ids.len(),
            "Requesting commit plan"
        );

        let reply = self
            .ai_client
            .send_request(prompts::SYSTEM_PROMPT, &user_prompt)
            .await
            .context("Failed to get commit plan from AI")?;

        let plan = parse_plan_response(&reply)?;
        debug!(proposals = plan.len(), "Parsed commit plan");
        Ok(plan)
    }
}

impl PlanGenerator for AiPlanGenerator {
    fn generate_plan<'a>(
        &'a self,
        context: &'a ProposalContext,
    ) -> Pin<Box<dyn Future<Output = Result<CommitPlan>> + Send + 'a>> {
        Box::pin(self.request_plan(context))
    }
}

/// Parses a model reply into a plan, tolerating markdown fences.
fn parse_plan_response(content: &str) -> Result<CommitPlan> {
    let yaml_content = extract_yaml_block(content);

    from_yaml::<CommitPlan>(yaml_content).map_err(|e| {
        debug!(raw = %content, extracted = %yaml_content, "Commit plan YAML did not parse");

        let reason = if yaml_content.lines().any(|line| line.contains('\t')) {
            "Found tab characters. YAML requires spaces for indentation.".to_string()
        } else if !yaml_content.contains("proposals") {
            "Reply does not contain a `proposals` list.".to_string()
        } else {
            format!("{:#}", e)
        };
        ClaudeError::PlanParsingFailed(reason).into()
    })
}

/// Creates a plan generator for the provider selected by the environment.
pub fn create_default_plan_generator(model: Option<String>) -> Result<AiPlanGenerator> {
    let credentials = check_ai_credentials(model.as_deref())?;

    let client: Box<dyn AiClient> = match credentials.provider {
        AiProvider::Ollama => {
            let base_url = get_env_var("OLLAMA_BASE_URL").ok();
            Box::new(OpenAiAiClient::new_ollama(credentials.model, base_url)?)
        }
        AiProvider::OpenAi => {
            let api_key = get_env_vars(&["OPENAI_API_KEY", "OPENAI_AUTH_TOKEN"])?;
            Box::new(OpenAiAiClient::new_openai(credentials.model, api_key)?)
        }
        AiProvider::Claude => {
            let api_key = get_env_vars(&[
                "CLAUDE_API_KEY",
                "ANTHROPIC_API_KEY",
                "ANTHROPIC_AUTH_TOKEN",
            ])
            .map_err(|_| ClaudeError::ApiKeyNotFound)?;
            match get_env_var("ANTHROPIC_BASE_URL") {
                Ok(base_url) => Box::new(ClaudeAiClient::with_base_url(
                    credentials.model,
                    api_key,
                    base_url,
                )?),
                Err(_) => Box::new(ClaudeAiClient::new(credentials.model, api_key)?),
            }
        }
    };

    Ok(AiPlanGenerator::new(client))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::claude::test_utils::ConfigurableMockAiClient;
    use crate::git::UnitId;

    fn context() -> ProposalContext {
        ProposalContext {
            text: "Changes (2):\n".to_string(),
            unit_ids: vec![UnitId(1), UnitId(2)],
            allow_exclusions: false,
        }
    }

    #[tokio::test]
    async fn parses_fenced_reply() {
        let mock = ConfigurableMockAiClient::new(vec![Ok(
            "Sure:\n```yaml\nproposals:\n  - message: \"feat: a\"\n    unit_ids: [1, 2]\n```".to_string(),
        )]);
        let prompts = mock.prompt_handle();
        let generator = AiPlanGenerator::new(Box::new(mock));

        let plan = generator.generate_plan(&context()).await.unwrap();

        assert_eq!(plan.proposals[0].unit_ids, vec![UnitId(1), UnitId(2)]);
        let sent = prompts.prompts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, prompts::SYSTEM_PROMPT);
        assert!(sent[0].1.contains("Available change ids: 1, 2"));
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let generator = AiPlanGenerator::new(Box::new(ConfigurableMockAiClient::new(vec![Err(
            anyhow::anyhow!("connection reset"),
        )])));
        let err = generator.generate_plan(&context()).await.unwrap_err();
        assert!(format!("{err:#}").contains("connection reset"));
    }

    #[test]
    fn unparseable_reply_explains_itself() {
        let err = parse_plan_response("I think you should commit everything.").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClaudeError>(),
            Some(ClaudeError::PlanParsingFailed(reason)) if reason.contains("proposals")
        ));

        let err = parse_plan_response("proposals:\n\t- message: x").unwrap_err();
        assert!(err.to_string().contains("tab characters"));
    }
}
