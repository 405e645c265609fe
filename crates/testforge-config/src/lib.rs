//! Configuration model and discovery
//!
//! Configuration is loaded with precedence: CLI flags > config file >
//! defaults. The config file is discovered by searching upward from the
//! working directory for `.testforge/config.toml`; `--config` short-circuits
//! discovery with an explicit path.

use std::path::Path;

use serde::{Deserialize, Serialize};

use testforge_model::{FormatKind, StrategyKind};
use testforge_utils::error::ConfigError;

/// Config file name searched for under `.testforge/`
pub const CONFIG_FILE: &str = "config.toml";

/// Directory holding the config file
pub const CONFIG_DIR: &str = ".testforge";

/// Upper bound on the per-pair retry budget; unbounded retry is forbidden
const MAX_RETRY_LIMIT: u32 = 10;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub generation: GenerationConfig,
    pub llm: LlmConfig,
}

/// Pipeline behavior knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Sectioning strategy
    pub strategy: StrategyKind,
    /// Formats to generate, in emission order
    pub formats: Vec<FormatKind>,
    /// Maximum simultaneous in-flight generation calls
    pub concurrency_limit: usize,
    /// Transport retry budget per (section, format) pair. Retries come on
    /// top of the initial attempt, so a pair is tried at most
    /// `1 + retry_limit` times before its transient failure becomes final.
    pub retry_limit: u32,
    /// Abort in-flight work on the first permanent failure instead of
    /// continuing best-effort
    pub fail_fast: bool,
    /// Coverage target percentage carried into prompts
    pub coverage_target: u8,
    /// Focus identifiers (tags or path prefixes) forced into priority sections
    pub focus: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Auto,
            formats: FormatKind::ALL.to_vec(),
            concurrency_limit: 3,
            retry_limit: 2,
            fail_fast: false,
            coverage_target: 90,
            focus: vec![],
        }
    }
}

/// LLM provider selection and per-provider settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// Provider token: `anthropic`, `openrouter`, or `mock`
    pub provider: Option<String>,
    pub anthropic: Option<ProviderConfig>,
    pub openrouter: Option<ProviderConfig>,
}

/// Settings shared by the HTTP providers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Custom API base URL
    pub base_url: Option<String>,
    /// Model identifier
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// CLI-provided overrides, applied on top of the discovered file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub strategy: Option<StrategyKind>,
    pub formats: Option<Vec<FormatKind>>,
    pub focus: Option<Vec<String>>,
    pub concurrency_limit: Option<usize>,
    pub retry_limit: Option<u32>,
    pub fail_fast: Option<bool>,
    pub provider: Option<String>,
}

impl Config {
    /// Load a config file from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFile`] if the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Config = toml::from_str(&text).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Discover configuration by searching upward from `start_dir` for
    /// `.testforge/config.toml`. Falls back to defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a discovered file is invalid. A missing
    /// file is not an error.
    pub fn discover(start_dir: &Path) -> Result<Self, ConfigError> {
        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            let candidate = current.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.is_file() {
                return Self::load(&candidate);
            }
            dir = current.parent();
        }
        Ok(Self::default())
    }

    /// Apply CLI overrides in place. CLI flags win over file values.
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(strategy) = overrides.strategy {
            self.generation.strategy = strategy;
        }
        if let Some(formats) = &overrides.formats {
            self.generation.formats = formats.clone();
        }
        if let Some(focus) = &overrides.focus {
            self.generation.focus = focus.clone();
        }
        if let Some(limit) = overrides.concurrency_limit {
            self.generation.concurrency_limit = limit;
        }
        if let Some(limit) = overrides.retry_limit {
            self.generation.retry_limit = limit;
        }
        if let Some(fail_fast) = overrides.fail_fast {
            self.generation.fail_fast = fail_fast;
        }
        if let Some(provider) = &overrides.provider {
            self.llm.provider = Some(provider.clone());
        }
    }

    /// Validate field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for out-of-range fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.concurrency_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "generation.concurrency_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.generation.retry_limit > MAX_RETRY_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "generation.retry_limit".to_string(),
                reason: format!("must be at most {MAX_RETRY_LIMIT}"),
            });
        }
        if self.generation.coverage_target > 100 {
            return Err(ConfigError::InvalidValue {
                field: "generation.coverage_target".to_string(),
                reason: "must be a percentage in 0..=100".to_string(),
            });
        }
        if self.generation.formats.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "generation.formats".to_string(),
                reason: "at least one format is required".to_string(),
            });
        }
        Ok(())
    }
}
