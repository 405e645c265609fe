//! Exit code constants for the testforge CLI
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Run completed, all artifacts consolidated |
//! | 1 | `SPEC_FAILURE` | Spec load, validation, or configuration failure |
//! | 2 | `GENERATION_FAILURE` | Generation failed after exhausting retries |
//! | 3 | `CONSOLIDATION_CONFLICT` | Duplicate test-case ID or variable conflict |

/// Type-safe process exit code. The numeric values are part of the CLI
/// contract and scripts may depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Run completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Spec load, validation, or configuration failure
    pub const SPEC_FAILURE: ExitCode = ExitCode(1);

    /// Generation failure after exhausting retries
    pub const GENERATION_FAILURE: ExitCode = ExitCode(2);

    /// Consolidation conflict (duplicate ID / variable conflict)
    pub const CONSOLIDATION_CONFLICT: ExitCode = ExitCode(3);

    /// Numeric value for `std::process::exit()`
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
