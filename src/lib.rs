//! testforge: LLM-driven API test artifact generation
//!
//! Turns a Swagger/OpenAPI document into ready-to-import test artifacts:
//! QMetry-importable CSV test cases, Karate DSL feature files, and a Postman
//! Collection Format v2.1.0 collection.
//!
//! The pipeline sections the document's endpoints, renders one prompt per
//! section and format, fans the generation calls out to an LLM backend under
//! a concurrency bound, validates each fragment's shape, and consolidates
//! fragments in section order. See the pipeline crates for the stages:
//!
//! - `testforge-section`: endpoint sectioning strategies
//! - `testforge-prompt`: `{{placeholder}}` template rendering
//! - `testforge-llm`: provider backends (Anthropic, OpenRouter, mock)
//! - `testforge-agents`: per-format generation and validation
//! - `testforge-consolidate`: order-preserving fragment merging
//! - `testforge-engine`: concurrency, retries, and run reporting
//!
//! This crate adds the document loader and the CLI on top.

pub mod cli;
pub mod loader;

pub use testforge_config::Config;
pub use testforge_engine::{Engine, GenerationPlan, RunOutcome, RunReport};
pub use testforge_model::{ApiSpec, ConsolidatedArtifact, FormatKind, Section, StrategyKind};
pub use testforge_section::Sectioner;
pub use testforge_utils::error::TestForgeError;
pub use testforge_utils::exit_codes::ExitCode;
