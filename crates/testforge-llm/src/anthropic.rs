//! Anthropic Messages API backend

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use testforge_config::{Config, ProviderConfig};
use testforge_utils::error::LlmError;

use crate::http_client::HttpClient;
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicBackend {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: String,
    default_model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicBackend {
    /// Build from `[llm.anthropic]` configuration.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the API key environment
    /// variable is unset, the model is missing, or the HTTP client cannot be
    /// constructed.
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let provider: &ProviderConfig = config.llm.anthropic.as_ref().ok_or_else(|| {
            LlmError::Misconfiguration(
                "provider 'anthropic' selected but [llm.anthropic] is not configured".to_string(),
            )
        })?;

        let api_key_env = provider.api_key_env.as_deref().unwrap_or("ANTHROPIC_API_KEY");
        let api_key = std::env::var(api_key_env).map_err(|_| {
            LlmError::Misconfiguration(format!(
                "Anthropic API key not found in environment variable '{api_key_env}'. \
                 Set it or configure a different api_key_env in [llm.anthropic]."
            ))
        })?;

        let default_model = provider.model.clone().ok_or_else(|| {
            LlmError::Misconfiguration(
                "Anthropic model not specified. Set [llm.anthropic] model = \"model-name\"."
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

    /// The Messages API carries system text in a top-level `system` field;
    /// split it off from the conversation messages.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
        let mut system: Option<String> = None;
        let mut wire = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    if let Some(existing) = system.as_mut() {
                        existing.push_str("\n\n");
                        existing.push_str(&msg.content);
                    } else {
                        system = Some(msg.content.clone());
                    }
                }
                Role::User => wire.push(WireMessage {
                    role: "user".to_string(),
                    content: msg.content.clone(),
                }),
                Role::Assistant => wire.push(WireMessage {
                    role: "assistant".to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        (system, wire)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };

        debug!(
            provider = "anthropic",
            model = %model,
            section = %inv.section_id,
            format = %inv.format,
            "invoking Anthropic backend"
        );

        let (system, messages) = Self::convert_messages(&inv.messages);

        let body = AnthropicRequest {
            model: model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
        };

        let request = reqwest::Client::new()
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let response = self
            .client
            .execute_with_retry(request, inv.timeout, "anthropic")
            .await?;

        let body: AnthropicResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("failed to parse Anthropic response: {e}"))
        })?;

        let content: String = body
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if content.is_empty() {
            return Err(LlmError::Transport(
                "Anthropic response missing text content".to_string(),
            ));
        }

        let mut result = LlmResult::new(content, "anthropic", model);
        if let Some(usage) = body.usage {
            result = result.with_tokens(usage.input_tokens, usage.output_tokens);
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
struct AnthropicRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_messages_splits_system() {
        let messages = vec![
            Message::system("you are a tester"),
            Message::user("generate"),
        ];
        let (system, wire) = AnthropicBackend::convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("you are a tester"));
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].role, "user");
    }

    #[test]
    fn test_convert_messages_concatenates_system_blocks() {
        let messages = vec![
            Message::system("first"),
            Message::system("second"),
            Message::user("go"),
        ];
        let (system, wire) = AnthropicBackend::convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("first\n\nsecond"));
        assert_eq!(wire.len(), 1);
    }

    #[test]
    fn test_missing_provider_table_is_misconfiguration() {
        let config = Config::default();
        match AnthropicBackend::new_from_config(&config) {
            Err(LlmError::Misconfiguration(msg)) => {
                assert!(msg.contains("[llm.anthropic]"));
            }
            other => panic!("expected Misconfiguration, got {:?}", other.map(|_| ())),
        }
    }
}
