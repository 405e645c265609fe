//! Scripted mock backend for deterministic tests
//!
//! Responses are keyed by `section_id/format`. A script can fail with
//! timeouts a fixed number of times before succeeding, which is how the
//! engine's retry-budget tests drive transient-failure scenarios without a
//! network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use testforge_model::{FormatKind, SectionId};
use testforge_utils::error::LlmError;

use crate::types::{LlmBackend, LlmInvocation, LlmResult};

#[derive(Debug, Clone)]
struct Script {
    response: String,
    /// Remaining timeout failures before the response is returned
    fail_times: u32,
}

/// Deterministic in-memory backend
#[derive(Debug, Default)]
pub struct MockBackend {
    scripts: Mutex<HashMap<String, Script>>,
    default_response: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(section_id: &SectionId, format: FormatKind) -> String {
        format!("{section_id}/{format}")
    }

    /// Script a response for one section/format pair
    #[must_use]
    pub fn with_response(
        self,
        section_id: &SectionId,
        format: FormatKind,
        response: impl Into<String>,
    ) -> Self {
        self.scripts.lock().unwrap().insert(
            Self::key(section_id, format),
            Script { response: response.into(), fail_times: 0 },
        );
        self
    }

    /// Script a response that times out `fail_times` times before succeeding
    #[must_use]
    pub fn with_flaky_response(
        self,
        section_id: &SectionId,
        format: FormatKind,
        fail_times: u32,
        response: impl Into<String>,
    ) -> Self {
        self.scripts.lock().unwrap().insert(
            Self::key(section_id, format),
            Script { response: response.into(), fail_times },
        );
        self
    }

    /// Fallback response for unscripted pairs
    #[must_use]
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = Some(response.into());
        self
    }

    /// Number of invocations recorded for one pair
    #[must_use]
    pub fn invocation_count(&self, section_id: &SectionId, format: FormatKind) -> usize {
        let key = Self::key(section_id, format);
        self.calls.lock().unwrap().iter().filter(|k| **k == key).count()
    }

    /// Total invocations across all pairs
    #[must_use]
    pub fn total_invocations(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let key = Self::key(&inv.section_id, inv.format);
        self.calls.lock().unwrap().push(key.clone());

        let mut scripts = self.scripts.lock().unwrap();
        if let Some(script) = scripts.get_mut(&key) {
            if script.fail_times > 0 {
                script.fail_times -= 1;
                return Err(LlmError::Timeout { duration: Duration::from_secs(1) });
            }
            return Ok(LlmResult::new(script.response.clone(), "mock", "mock-model"));
        }
        drop(scripts);

        match &self.default_response {
            Some(response) => Ok(LlmResult::new(response.clone(), "mock", "mock-model")),
            None => Err(LlmError::Transport(format!("no scripted response for '{key}'"))),
        }
    }
}
