//! Core types for the LLM backend abstraction

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use testforge_model::{FormatKind, SectionId};
use testforge_utils::error::LlmError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Input to one backend invocation: one section, one target format.
///
/// The invocation is the single call boundary behind which provider
/// non-determinism is isolated; everything upstream of it is pure.
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    /// Section this call generates for
    pub section_id: SectionId,
    /// Target artifact format
    pub format: FormatKind,
    /// Model override; empty string uses the backend default
    pub model: String,
    /// Per-call timeout
    pub timeout: Duration,
    /// Ordered conversation messages
    pub messages: Vec<Message>,
    /// Provider-specific parameters (e.g. temperature, max_tokens)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LlmInvocation {
    #[must_use]
    pub fn new(
        section_id: SectionId,
        format: FormatKind,
        timeout: Duration,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            section_id,
            format,
            model: String::new(),
            timeout,
            messages,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Result from one backend invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResult {
    /// Raw response text
    pub raw_response: String,
    /// Provider token (`anthropic`, `openrouter`, `mock`)
    pub provider: String,
    /// Model actually used
    pub model_used: String,
    /// Input tokens consumed, when the provider reports them
    pub tokens_input: Option<u64>,
    /// Output tokens generated, when the provider reports them
    pub tokens_output: Option<u64>,
}

impl LlmResult {
    #[must_use]
    pub fn new(
        raw_response: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = Some(input);
        self.tokens_output = Some(output);
        self
    }
}

/// Trait implemented by every provider.
///
/// Backends share no mutable state across calls; a single invocation never
/// observes another's progress.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Invoke the model.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] for transport failures, provider errors (auth,
    /// quota, outage), timeouts, and misconfiguration.
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError>;
}
