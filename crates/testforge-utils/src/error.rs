//! Error taxonomy for the generation pipeline
//!
//! Errors are grouped by the component that raises them and aggregated into
//! [`TestForgeError`]. The grouping also encodes the retry policy:
//!
//! - [`SectionError`] and [`RenderError`] are structural; they indicate a bad
//!   input or a programming error and are never retried.
//! - [`LlmError`] transport variants are transient and subject to the bounded
//!   retry budget in the engine.
//! - [`ArtifactError::Malformed`] is retried exactly once (one-off generation
//!   noise), then surfaced as a hard failure for that section/format pair.
//! - [`ConsolidateError`] conflicts are never auto-resolved; they always reach
//!   the caller with the identifiers involved.

use std::time::Duration;
use thiserror::Error;

use testforge_model::{FormatKind, SectionId};

use crate::exit_codes::ExitCode;

/// Errors raised while sectioning an API spec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    #[error("spec '{title}' has no endpoints to section")]
    EmptySpec { title: String },

    #[error(
        "unknown sectioning strategy '{token}'. Available strategies: \
         by_tag, by_path, by_method, by_complexity, auto"
    )]
    UnknownStrategy { token: String },
}

/// Errors raised while rendering a prompt template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("no binding for placeholder '{{{{{placeholder}}}}}' in template")]
    MissingBinding { placeholder: String },
}

/// Errors raised while validating a generated fragment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("malformed {format} fragment for section '{section_id}': {reason}")]
    Malformed {
        format: FormatKind,
        section_id: SectionId,
        reason: String,
    },
}

/// Errors raised while consolidating fragments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsolidateError {
    #[error(
        "duplicate test case ID '{id}' emitted by sections '{first_section}' and '{second_section}'"
    )]
    DuplicateId {
        id: String,
        first_section: SectionId,
        second_section: SectionId,
    },

    #[error(
        "conflicting definitions of collection variable '{name}': \
         section '{first_section}' sets '{first_value}', section '{second_section}' sets '{second_value}'"
    )]
    VariableConflict {
        name: String,
        first_section: SectionId,
        first_value: String,
        second_section: SectionId,
        second_value: String,
    },

    #[error("no fragments supplied for {format} consolidation")]
    NoFragments { format: FormatKind },

    #[error("fragment for section '{section_id}' has format {actual}, expected {expected}")]
    FormatMismatch {
        section_id: SectionId,
        expected: FormatKind,
        actual: FormatKind,
    },
}

/// Errors raised by LLM backends. Transport-class variants are the only
/// transient errors in the system and the only ones the engine retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("provider authentication failed: {0}")]
    ProviderAuth(String),

    #[error("provider rate limit exceeded: {0}")]
    ProviderQuota(String),

    #[error("provider outage: {0}")]
    ProviderOutage(String),

    #[error("backend misconfiguration: {0}")]
    Misconfiguration(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl LlmError {
    /// Whether the engine may retry this error within the retry budget.
    /// Auth and configuration failures will not heal on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Transport(_)
                | LlmError::Timeout { .. }
                | LlmError::ProviderQuota(_)
                | LlmError::ProviderOutage(_)
        )
    }
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid config file '{path}': {reason}")]
    InvalidFile { path: String, reason: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Top-level error type for testforge library operations.
///
/// Library code returns `TestForgeError` and never calls
/// `std::process::exit()`; the CLI maps errors to exit codes via
/// [`to_exit_code`](Self::to_exit_code).
#[derive(Error, Debug)]
pub enum TestForgeError {
    #[error("sectioning error: {0}")]
    Section(#[from] SectionError),

    #[error("prompt rendering error: {0}")]
    Render(#[from] RenderError),

    #[error("artifact validation error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("consolidation error: {0}")]
    Consolidate(#[from] ConsolidateError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load spec '{path}': {reason}")]
    SpecLoad { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TestForgeError {
    /// Map this error to the documented CLI exit code.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 1 | spec load / validation / configuration failure |
    /// | 2 | generation failure after exhausting retries |
    /// | 3 | consolidation conflict (duplicate ID, variable conflict) |
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            TestForgeError::Section(_)
            | TestForgeError::Render(_)
            | TestForgeError::Config(_)
            | TestForgeError::SpecLoad { .. }
            | TestForgeError::Io(_) => ExitCode::SPEC_FAILURE,
            TestForgeError::Artifact(_) | TestForgeError::Llm(_) => ExitCode::GENERATION_FAILURE,
            TestForgeError::Consolidate(_) => ExitCode::CONSOLIDATION_CONFLICT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testforge_model::SectionId;

    #[test]
    fn test_missing_binding_names_placeholder() {
        let err = RenderError::MissingBinding {
            placeholder: "endpoint_count".to_string(),
        };
        assert!(err.to_string().contains("{{endpoint_count}}"));
    }

    #[test]
    fn test_duplicate_id_names_both_sections() {
        let err = ConsolidateError::DuplicateId {
            id: "TC_USERS_001".to_string(),
            first_section: SectionId::from_key("users"),
            second_section: SectionId::from_key("admin users"),
        };
        let msg = err.to_string();
        assert!(msg.contains("TC_USERS_001"));
        assert!(msg.contains("users"));
        assert!(msg.contains("admin_users"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout { duration: Duration::from_secs(5) }.is_transient());
        assert!(LlmError::ProviderOutage("502".to_string()).is_transient());
        assert!(!LlmError::ProviderAuth("401".to_string()).is_transient());
        assert!(!LlmError::Misconfiguration("no key".to_string()).is_transient());
    }

    #[test]
    fn test_exit_code_mapping() {
        let section: TestForgeError = SectionError::EmptySpec { title: "t".to_string() }.into();
        assert_eq!(section.to_exit_code(), ExitCode::SPEC_FAILURE);

        let llm: TestForgeError = LlmError::Transport("boom".to_string()).into();
        assert_eq!(llm.to_exit_code(), ExitCode::GENERATION_FAILURE);

        let conflict: TestForgeError = ConsolidateError::NoFragments {
            format: testforge_model::FormatKind::Csv,
        }
        .into();
        assert_eq!(conflict.to_exit_code(), ExitCode::CONSOLIDATION_CONFLICT);
    }

    #[test]
    fn test_unknown_strategy_lists_tokens() {
        let err = SectionError::UnknownStrategy { token: "by_magic".to_string() };
        let msg = err.to_string();
        assert!(msg.contains("by_magic"));
        assert!(msg.contains("by_complexity"));
    }
}
