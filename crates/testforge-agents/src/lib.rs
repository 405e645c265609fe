//! Generation agents
//!
//! One agent per target format. An agent shapes the conversation for the
//! backend call and validates the shape of what comes back; it owns no state
//! and every call is independent, so identical inputs are idempotent up to
//! the backend's own non-determinism.
//!
//! Validation never passes malformed output through: a fragment that does
//! not parse as its declared shape fails with
//! [`ArtifactError::Malformed`](testforge_utils::error::ArtifactError) and
//! the caller decides the retry policy.

mod csv;
mod karate;
mod postman;

use std::time::Duration;

use async_trait::async_trait;

use testforge_llm::{LlmBackend, LlmInvocation, Message};
use testforge_model::{ArtifactFragment, FormatKind, Section};
use testforge_utils::error::TestForgeError;

pub use csv::CsvAgent;
pub use karate::KarateAgent;
pub use postman::PostmanAgent;

/// Default per-call timeout
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-call settings threaded into every agent explicitly; no process-wide
/// mutable configuration exists.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Model override; empty uses the backend default
    pub model: String,
    /// Per-call timeout
    pub timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self { model: String::new(), timeout: DEFAULT_AGENT_TIMEOUT }
    }
}

/// Validated fragment plus the token usage the provider reported for the
/// call, when it reported any
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub fragment: ArtifactFragment,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

/// One generation capability: section in, validated fragment out
#[async_trait]
pub trait GenerationAgent: Send + Sync {
    /// Format this agent produces
    fn format(&self) -> FormatKind;

    /// Invoke the backend for one section and validate the returned shape.
    ///
    /// # Errors
    ///
    /// Returns `TestForgeError::Llm` for transport-class failures and
    /// `TestForgeError::Artifact` when the response does not parse as the
    /// declared fragment shape.
    async fn generate(
        &self,
        section: &Section,
        rendered_prompt: &str,
        backend: &dyn LlmBackend,
    ) -> Result<AgentOutput, TestForgeError>;
}

/// Construct the agent for a format
#[must_use]
pub fn agent_for(format: FormatKind, settings: AgentSettings) -> Box<dyn GenerationAgent> {
    match format {
        FormatKind::Csv => Box::new(CsvAgent::new(settings)),
        FormatKind::Karate => Box::new(KarateAgent::new(settings)),
        FormatKind::Postman => Box::new(PostmanAgent::new(settings)),
    }
}

/// Build the standard two-message conversation for a generation call
pub(crate) fn build_invocation(
    section: &Section,
    format: FormatKind,
    system_prompt: &str,
    rendered_prompt: &str,
    settings: &AgentSettings,
) -> LlmInvocation {
    LlmInvocation::new(
        section.id.clone(),
        format,
        settings.timeout,
        vec![
            Message::system(system_prompt),
            Message::user(rendered_prompt),
        ],
    )
    .with_model(settings.model.clone())
}

/// Strip a single markdown code fence wrapping the whole response, if
/// present. Models wrap structured output in fences often enough that
/// rejecting it outright would waste a retry.
#[must_use]
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the language tag on the opening fence line
    match body.split_once('\n') {
        Some((_, content)) => content.trim(),
        None => body.trim(),
    }
}
