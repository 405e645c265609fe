//! CSV test-case agent
//!
//! Asks the backend for a JSON `test_cases` envelope (free-form CSV text is
//! far harder to validate) and converts the validated cases to rows aligned
//! with the QMetry header set.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use testforge_llm::LlmBackend;
use testforge_model::csv::CsvRow;
use testforge_model::{ArtifactFragment, FormatKind, FragmentContent, Section};
use testforge_utils::error::{ArtifactError, TestForgeError};

use crate::{build_invocation, strip_code_fence, AgentOutput, AgentSettings, GenerationAgent};

/// Wire shape requested from the model
#[derive(Debug, Deserialize)]
struct CsvEnvelope {
    test_cases: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
struct TestCase {
    test_case_id: String,
    test_case_name: String,
    #[serde(default)]
    test_case_description: String,
    #[serde(default = "default_module")]
    module: String,
    #[serde(default = "default_test_type")]
    test_type: String,
    #[serde(default = "default_priority")]
    priority: String,
    #[serde(default = "default_estimated_time")]
    estimated_time: String,
    #[serde(default)]
    preconditions: String,
    test_steps: String,
    expected_results: String,
    #[serde(default)]
    test_data: String,
    #[serde(default)]
    tags: String,
}

fn default_module() -> String {
    "API Tests".to_string()
}
fn default_test_type() -> String {
    "Functional".to_string()
}
fn default_priority() -> String {
    "Medium".to_string()
}
fn default_estimated_time() -> String {
    "15".to_string()
}

impl TestCase {
    /// Cells in `DEFAULT_HEADERS` order
    fn into_row(self) -> CsvRow {
        CsvRow {
            cells: vec![
                self.test_case_id,
                self.test_case_name,
                self.test_case_description,
                self.module,
                self.test_type,
                self.priority,
                self.estimated_time,
                self.preconditions,
                self.test_steps,
                self.expected_results,
                self.test_data,
                self.tags,
            ],
        }
    }
}

/// Generation agent for QMetry CSV test cases
pub struct CsvAgent {
    settings: AgentSettings,
}

impl CsvAgent {
    #[must_use]
    pub fn new(settings: AgentSettings) -> Self {
        Self { settings }
    }

    fn parse_fragment(
        section: &Section,
        raw: &str,
    ) -> Result<Vec<CsvRow>, ArtifactError> {
        let malformed = |reason: String| ArtifactError::Malformed {
            format: FormatKind::Csv,
            section_id: section.id.clone(),
            reason,
        };

        let envelope: CsvEnvelope = serde_json::from_str(strip_code_fence(raw))
            .map_err(|e| malformed(format!("response is not a valid test_cases envelope: {e}")))?;

        if envelope.test_cases.is_empty() {
            return Err(malformed("envelope contains no test cases".to_string()));
        }

        for case in &envelope.test_cases {
            if case.test_case_id.trim().is_empty() {
                return Err(malformed("test case with empty test_case_id".to_string()));
            }
            if case.test_steps.trim().is_empty() || case.expected_results.trim().is_empty() {
                return Err(malformed(format!(
                    "test case '{}' is missing steps or expected results",
                    case.test_case_id
                )));
            }
        }

        Ok(envelope.test_cases.into_iter().map(TestCase::into_row).collect())
    }
}

#[async_trait]
impl GenerationAgent for CsvAgent {
    fn format(&self) -> FormatKind {
        FormatKind::Csv
    }

    async fn generate(
        &self,
        section: &Section,
        rendered_prompt: &str,
        backend: &dyn LlmBackend,
    ) -> Result<AgentOutput, TestForgeError> {
        let inv = build_invocation(
            section,
            FormatKind::Csv,
            testforge_prompt::system_prompt(FormatKind::Csv),
            rendered_prompt,
            &self.settings,
        );
        let result = backend.invoke(inv).await?;

        let rows = Self::parse_fragment(section, &result.raw_response)?;
        debug!(
            section = %section.id,
            rows = rows.len(),
            "validated CSV fragment"
        );

        Ok(AgentOutput {
            fragment: ArtifactFragment {
                section_id: section.id.clone(),
                section_index: section.index,
                format: FormatKind::Csv,
                content: FragmentContent::Csv(rows),
            },
            tokens_input: result.tokens_input,
            tokens_output: result.tokens_output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testforge_llm::MockBackend;
    use testforge_model::SectionId;

    fn section() -> Section {
        Section {
            id: SectionId::from_key("users"),
            index: 0,
            name: "users".to_string(),
            description: "user endpoints".to_string(),
            coverage_target: 90,
            endpoints: vec![],
        }
    }

    fn valid_envelope() -> String {
        serde_json::json!({
            "test_cases": [{
                "test_case_id": "TC_USERS_001",
                "test_case_name": "Verify list users returns 200",
                "test_case_description": "Smoke test for GET /users",
                "module": "User Management",
                "test_type": "Functional",
                "priority": "High",
                "test_steps": "1. Call GET /users",
                "expected_results": "200 with a JSON array"
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_valid_envelope_becomes_fragment() {
        let section = section();
        let backend =
            MockBackend::new().with_response(&section.id, FormatKind::Csv, valid_envelope());

        let agent = CsvAgent::new(AgentSettings::default());
        let output = agent.generate(&section, "prompt", &backend).await.unwrap();
        let fragment = output.fragment;

        assert_eq!(fragment.section_index, 0);
        let FragmentContent::Csv(rows) = &fragment.content else {
            panic!("expected CSV content");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].test_case_id(), "TC_USERS_001");
        assert_eq!(rows[0].cells.len(), testforge_model::csv::DEFAULT_HEADERS.len());
    }

    #[tokio::test]
    async fn test_fenced_envelope_accepted() {
        let section = section();
        let fenced = format!("```json\n{}\n```", valid_envelope());
        let backend =
            MockBackend::new().with_response(&section.id, FormatKind::Csv, fenced);

        let agent = CsvAgent::new(AgentSettings::default());
        assert!(agent.generate(&section, "prompt", &backend).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_json_response_is_malformed() {
        let section = section();
        let backend = MockBackend::new().with_response(
            &section.id,
            FormatKind::Csv,
            "Sure! Here are your test cases:",
        );

        let agent = CsvAgent::new(AgentSettings::default());
        let err = agent.generate(&section, "prompt", &backend).await.unwrap_err();
        assert!(matches!(
            err,
            TestForgeError::Artifact(ArtifactError::Malformed { format: FormatKind::Csv, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_test_cases_is_malformed() {
        let section = section();
        let backend = MockBackend::new().with_response(
            &section.id,
            FormatKind::Csv,
            r#"{"test_cases": []}"#,
        );

        let agent = CsvAgent::new(AgentSettings::default());
        assert!(agent.generate(&section, "prompt", &backend).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_steps_is_malformed() {
        let section = section();
        let body = serde_json::json!({
            "test_cases": [{
                "test_case_id": "TC_USERS_001",
                "test_case_name": "incomplete",
                "test_steps": "",
                "expected_results": "200"
            }]
        })
        .to_string();
        let backend = MockBackend::new().with_response(&section.id, FormatKind::Csv, body);

        let agent = CsvAgent::new(AgentSettings::default());
        let err = agent.generate(&section, "prompt", &backend).await.unwrap_err();
        assert!(err.to_string().contains("TC_USERS_001"));
    }
}
