//! Preflight validation checks for early failure detection
//!
//! Commands call these before doing anything expensive so that missing
//! credentials or an unusable repository fail fast with a clear message.

use anyhow::{Context, Result};

use crate::git::GitRepository;
use crate::utils::settings::{env_flag, get_env_var, get_env_vars};

/// Default Anthropic model.
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-5";

/// Default OpenAI model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5";

/// Default Ollama model.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";

/// Result of AI credential validation
#[derive(Debug)]
pub struct AiCredentialInfo {
    /// The AI provider that will be used
    pub provider: AiProvider,
    /// The model that will be used
    pub model: String,
}

/// AI provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    /// Anthropic Claude API
    Claude,
    /// OpenAI API
    OpenAi,
    /// Local Ollama
    Ollama,
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Claude => write!(f, "Claude API"),
            Self::OpenAi => write!(f, "OpenAI API"),
            Self::Ollama => write!(f, "Ollama"),
        }
    }
}

/// Validate AI credentials are available before processing
///
/// Checks environment variables (with settings fallback) without building
/// a client. `USE_OLLAMA=true` wins over `USE_OPENAI=true`; otherwise the
/// Claude API is used.
pub fn check_ai_credentials(model_override: Option<&str>) -> Result<AiCredentialInfo> {
    let pick_model = |env_key: &str, default: &str| {
        model_override
            .map(String::from)
            .or_else(|| get_env_var(env_key).ok())
            .unwrap_or_else(|| default.to_string())
    };

    if env_flag("USE_OLLAMA") {
        return Ok(AiCredentialInfo {
            provider: AiProvider::Ollama,
            model: pick_model("OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
        });
    }

    if env_flag("USE_OPENAI") {
        get_env_vars(&["OPENAI_API_KEY", "OPENAI_AUTH_TOKEN"]).map_err(|_| {
            anyhow::anyhow!(
                "OpenAI API key not found.\n\
                 Set one of these environment variables:\n\
                 - OPENAI_API_KEY\n\
                 - OPENAI_AUTH_TOKEN"
            )
        })?;

        return Ok(AiCredentialInfo {
            provider: AiProvider::OpenAi,
            model: pick_model("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
        });
    }

    get_env_vars(&[
        "CLAUDE_API_KEY",
        "ANTHROPIC_API_KEY",
        "ANTHROPIC_AUTH_TOKEN",
    ])
    .map_err(|_| {
        anyhow::anyhow!(
            "Claude API key not found.\n\
             Set one of these environment variables:\n\
             - CLAUDE_API_KEY\n\
             - ANTHROPIC_API_KEY\n\
             - ANTHROPIC_AUTH_TOKEN"
        )
    })?;

    Ok(AiCredentialInfo {
        provider: AiProvider::Claude,
        model: pick_model("ANTHROPIC_MODEL", DEFAULT_CLAUDE_MODEL),
    })
}

/// Opens the repository in the current directory and checks that it can
/// be regrouped: it has a working tree and nothing is staged yet.
pub fn check_regroup_repository() -> Result<GitRepository> {
    let repo = GitRepository::open().context(
        "Not in a git repository. Please run this command from within a git repository.",
    )?;
    if repo.workdir().is_none() {
        anyhow::bail!("Cannot regroup changes in a bare repository");
    }
    repo.ensure_nothing_staged()?;
    Ok(repo)
}
