//! OpenRouter chat-completions backend (OpenAI-compatible wire format)

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use testforge_config::{Config, ProviderConfig};
use testforge_utils::error::LlmError;

use crate::http_client::HttpClient;
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Clone)]
pub struct OpenRouterBackend {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: String,
    default_model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenRouterBackend {
    /// Build from `[llm.openrouter]` configuration.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` for a missing API key env var,
    /// missing model, or HTTP client construction failure.
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let provider: &ProviderConfig = config.llm.openrouter.as_ref().ok_or_else(|| {
            LlmError::Misconfiguration(
                "provider 'openrouter' selected but [llm.openrouter] is not configured"
                    .to_string(),
            )
        })?;

        let api_key_env = provider.api_key_env.as_deref().unwrap_or("OPENROUTER_API_KEY");
        let api_key = std::env::var(api_key_env).map_err(|_| {
            LlmError::Misconfiguration(format!(
                "OpenRouter API key not found in environment variable '{api_key_env}'. \
                 Set it or configure a different api_key_env in [llm.openrouter]."
            ))
        })?;

        let default_model = provider.model.clone().ok_or_else(|| {
            LlmError::Misconfiguration(
                "OpenRouter model not specified. Set [llm.openrouter] model = \"model-name\"."
                    .to_string(),
            )
        })?;

        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: provider
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model,
            max_tokens: provider.max_tokens.unwrap_or(4096),
            temperature: provider.temperature.unwrap_or(0.2),
        })
    }

    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|msg| WireMessage {
                role: match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                }
                .to_string(),
                content: msg.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl LlmBackend for OpenRouterBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };

        debug!(
            provider = "openrouter",
            model = %model,
            section = %inv.section_id,
            format = %inv.format,
            "invoking OpenRouter backend"
        );

        let body = ChatRequest {
            model: model.clone(),
            messages: Self::convert_messages(&inv.messages),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let request = reqwest::Client::new()
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body);

        let response = self
            .client
            .execute_with_retry(request, inv.timeout, "openrouter")
            .await?;

        let body: ChatResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("failed to parse OpenRouter response: {e}"))
        })?;

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::Transport(
                "OpenRouter response missing message content".to_string(),
            ));
        }

        let mut result = LlmResult::new(content, "openrouter", model);
        if let Some(usage) = body.usage {
            result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }
        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_messages_keeps_roles_inline() {
        let wire = OpenRouterBackend::convert_messages(&[
            Message::system("sys"),
            Message::user("hi"),
        ]);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[1].role, "user");
    }

    #[test]
    fn test_missing_provider_table_is_misconfiguration() {
        let config = Config::default();
        assert!(matches!(
            OpenRouterBackend::new_from_config(&config),
            Err(LlmError::Misconfiguration(_))
        ));
    }
}
