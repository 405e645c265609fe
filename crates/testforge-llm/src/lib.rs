//! LLM backend abstraction for multi-provider support
//!
//! Every provider implements [`LlmBackend`], so the engine issues generation
//! calls without knowing which provider serves them. The factory picks a
//! backend from configuration; `mock` is a real provider token so tests and
//! dry runs exercise the same construction path as production.

mod anthropic;
mod http_client;
mod mock;
mod openrouter;
mod types;

pub use anthropic::AnthropicBackend;
pub use mock::MockBackend;
pub use openrouter::OpenRouterBackend;
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

pub use testforge_utils::error::LlmError;

use testforge_config::Config;

/// Default provider when the config names none
pub const DEFAULT_PROVIDER: &str = "anthropic";

/// Construct a backend from configuration.
///
/// # Errors
///
/// Returns [`LlmError::Unsupported`] for an unknown provider token and
/// [`LlmError::Misconfiguration`] when the selected provider's configuration
/// is incomplete.
pub fn from_config(config: &Config) -> Result<Box<dyn LlmBackend>, LlmError> {
    let provider = config.llm.provider.as_deref().unwrap_or(DEFAULT_PROVIDER);

    match provider {
        "anthropic" => Ok(Box::new(AnthropicBackend::new_from_config(config)?)),
        "openrouter" => Ok(Box::new(OpenRouterBackend::new_from_config(config)?)),
        "mock" => Ok(Box::new(
            MockBackend::new().with_default_response("mock response"),
        )),
        unknown => Err(LlmError::Unsupported(format!(
            "unknown LLM provider '{unknown}'. Supported providers: anthropic, openrouter, mock."
        ))),
    }
}
