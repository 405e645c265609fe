//! Karate feature agent
//!
//! The backend returns plain feature text; validation splits it into
//! `Feature:` blocks and requires at least one block per endpoint in the
//! section. Blocks stay distinct; the consolidator never merges scenario
//! content across fragments.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use testforge_llm::LlmBackend;
use testforge_model::{ArtifactFragment, FormatKind, FragmentContent, KarateFeature, Section};
use testforge_utils::error::{ArtifactError, TestForgeError};

use crate::{build_invocation, strip_code_fence, AgentOutput, AgentSettings, GenerationAgent};

/// `Feature:` at the start of a line, title on the same line
static FEATURE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Feature:[ \t]*(.*)$").unwrap());

/// Generation agent for Karate DSL feature files
pub struct KarateAgent {
    settings: AgentSettings,
}

impl KarateAgent {
    #[must_use]
    pub fn new(settings: AgentSettings) -> Self {
        Self { settings }
    }

    fn parse_fragment(
        section: &Section,
        raw: &str,
    ) -> Result<Vec<KarateFeature>, ArtifactError> {
        let malformed = |reason: String| ArtifactError::Malformed {
            format: FormatKind::Karate,
            section_id: section.id.clone(),
            reason,
        };

        let text = strip_code_fence(raw);
        let headers: Vec<_> = FEATURE_HEADER.find_iter(text).collect();

        if headers.is_empty() {
            return Err(malformed("response contains no Feature: block".to_string()));
        }
        if headers.len() < section.endpoints.len() {
            return Err(malformed(format!(
                "expected at least one Feature: block per endpoint ({} endpoints, {} features)",
                section.endpoints.len(),
                headers.len()
            )));
        }

        let mut features = Vec::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            let end = headers.get(i + 1).map_or(text.len(), |next| next.start());
            let body = text[header.start()..end].trim_end().to_string();
            let title = FEATURE_HEADER
                .captures(&text[header.start()..end])
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            features.push(KarateFeature { title, body });
        }

        Ok(features)
    }
}

#[async_trait]
impl GenerationAgent for KarateAgent {
    fn format(&self) -> FormatKind {
        FormatKind::Karate
    }

    async fn generate(
        &self,
        section: &Section,
        rendered_prompt: &str,
        backend: &dyn LlmBackend,
    ) -> Result<AgentOutput, TestForgeError> {
        let inv = build_invocation(
            section,
            FormatKind::Karate,
            testforge_prompt::system_prompt(FormatKind::Karate),
            rendered_prompt,
            &self.settings,
        );
        let result = backend.invoke(inv).await?;

        let features = Self::parse_fragment(section, &result.raw_response)?;
        debug!(
            section = %section.id,
            features = features.len(),
            "validated Karate fragment"
        );

        Ok(AgentOutput {
            fragment: ArtifactFragment {
                section_id: section.id.clone(),
                section_index: section.index,
                format: FormatKind::Karate,
                content: FragmentContent::Karate(features),
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
    use testforge_model::{Endpoint, HttpMethod, SectionId};

    fn endpoint(path: &str) -> Endpoint {
        Endpoint {
            path: path.to_string(),
            method: HttpMethod::Get,
            operation_id: None,
            tags: vec![],
            parameters: vec![],
            request_schema: None,
            response_schema: None,
            description: String::new(),
        }
    }

    fn section(endpoint_count: usize) -> Section {
        Section {
            id: SectionId::from_key("orders"),
            index: 1,
            name: "orders".to_string(),
            description: String::new(),
            coverage_target: 90,
            endpoints: (0..endpoint_count).map(|i| endpoint(&format!("/o{i}"))).collect(),
        }
    }

    const TWO_FEATURES: &str = "\
Feature: List orders
  Scenario: happy path
    Given url baseUrl + '/orders'
    When method get
    Then status 200

Feature: Get order by id
  Scenario: not found
    Given url baseUrl + '/orders/999'
    When method get
    Then status 404";

    #[tokio::test]
    async fn test_feature_blocks_split_and_titled() {
        let section = section(2);
        let backend =
            MockBackend::new().with_response(&section.id, FormatKind::Karate, TWO_FEATURES);

        let agent = KarateAgent::new(AgentSettings::default());
        let output = agent.generate(&section, "prompt", &backend).await.unwrap();

        let FragmentContent::Karate(features) = &output.fragment.content else {
            panic!("expected Karate content");
        };
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].title, "List orders");
        assert!(features[0].body.starts_with("Feature: List orders"));
        assert!(features[0].body.contains("status 200"));
        assert!(!features[0].body.contains("status 404"));
        assert_eq!(features[1].title, "Get order by id");
    }

    #[tokio::test]
    async fn test_no_feature_block_is_malformed() {
        let section = section(1);
        let backend = MockBackend::new().with_response(
            &section.id,
            FormatKind::Karate,
            "Here is some prose instead of a feature file.",
        );

        let agent = KarateAgent::new(AgentSettings::default());
        let err = agent.generate(&section, "prompt", &backend).await.unwrap_err();
        assert!(matches!(
            err,
            TestForgeError::Artifact(ArtifactError::Malformed { format: FormatKind::Karate, .. })
        ));
    }

    #[tokio::test]
    async fn test_fewer_features_than_endpoints_is_malformed() {
        let section = section(3);
        let backend =
            MockBackend::new().with_response(&section.id, FormatKind::Karate, TWO_FEATURES);

        let agent = KarateAgent::new(AgentSettings::default());
        let err = agent.generate(&section, "prompt", &backend).await.unwrap_err();
        assert!(err.to_string().contains("3 endpoints"));
    }
}
