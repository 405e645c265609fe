//! Foundation utilities for testforge: error taxonomy, exit codes, logging

pub mod error;
pub mod exit_codes;
pub mod logging;

pub use error::{
    ArtifactError, ConfigError, ConsolidateError, LlmError, RenderError, SectionError,
    TestForgeError,
};
pub use exit_codes::ExitCode;
