//! Postman folder agent
//!
//! The backend returns a JSON folder object; validation checks the
//! folder/item structure and that every request carries a known HTTP method
//! and a non-empty URL.

use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use testforge_llm::LlmBackend;
use testforge_model::{
    ArtifactFragment, FormatKind, FragmentContent, HttpMethod, PostmanFolder, PostmanItem,
    PostmanRequest, PostmanVariable, Section,
};
use testforge_utils::error::{ArtifactError, TestForgeError};

use crate::{build_invocation, strip_code_fence, AgentOutput, AgentSettings, GenerationAgent};

/// Wire shape requested from the model. `request` accepts either the string
/// shorthand Postman allows for URLs or the object form.
#[derive(Debug, Deserialize)]
struct FolderWire {
    #[serde(default)]
    name: String,
    #[serde(default)]
    item: Vec<ItemWire>,
    #[serde(default)]
    variable: Vec<VariableWire>,
}

#[derive(Debug, Deserialize)]
struct ItemWire {
    name: String,
    request: RequestWire,
}

#[derive(Debug, Deserialize)]
struct RequestWire {
    method: String,
    url: serde_json::Value,
    #[serde(default)]
    body: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VariableWire {
    key: String,
    value: String,
}

/// Generation agent for Postman collection folders
pub struct PostmanAgent {
    settings: AgentSettings,
}

impl PostmanAgent {
    #[must_use]
    pub fn new(settings: AgentSettings) -> Self {
        Self { settings }
    }

    fn parse_fragment(section: &Section, raw: &str) -> Result<PostmanFolder, ArtifactError> {
        let malformed = |reason: String| ArtifactError::Malformed {
            format: FormatKind::Postman,
            section_id: section.id.clone(),
            reason,
        };

        let wire: FolderWire = serde_json::from_str(strip_code_fence(raw))
            .map_err(|e| malformed(format!("response is not a valid folder object: {e}")))?;

        if wire.item.is_empty() {
            return Err(malformed("folder contains no request items".to_string()));
        }

        let mut items = Vec::with_capacity(wire.item.len());
        for item in wire.item {
            if HttpMethod::from_str(&item.request.method).is_err() {
                return Err(malformed(format!(
                    "item '{}' has unknown HTTP method '{}'",
                    item.name, item.request.method
                )));
            }

            let url = match &item.request.url {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Object(obj) => obj
                    .get("raw")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                _ => String::new(),
            };
            if url.is_empty() {
                return Err(malformed(format!("item '{}' has no URL", item.name)));
            }

            items.push(PostmanItem {
                name: item.name,
                request: PostmanRequest {
                    method: item.request.method.to_uppercase(),
                    url,
                    body: item.request.body,
                },
            });
        }

        let name = if wire.name.is_empty() { section.name.clone() } else { wire.name };

        Ok(PostmanFolder {
            name,
            description: Some(section.description.clone()),
            items,
            variables: wire
                .variable
                .into_iter()
                .map(|v| PostmanVariable { key: v.key, value: v.value })
                .collect(),
        })
    }
}

#[async_trait]
impl GenerationAgent for PostmanAgent {
    fn format(&self) -> FormatKind {
        FormatKind::Postman
    }

    async fn generate(
        &self,
        section: &Section,
        rendered_prompt: &str,
        backend: &dyn LlmBackend,
    ) -> Result<AgentOutput, TestForgeError> {
        let inv = build_invocation(
            section,
            FormatKind::Postman,
            testforge_prompt::system_prompt(FormatKind::Postman),
            rendered_prompt,
            &self.settings,
        );
        let result = backend.invoke(inv).await?;

        let folder = Self::parse_fragment(section, &result.raw_response)?;
        debug!(
            section = %section.id,
            items = folder.items.len(),
            "validated Postman fragment"
        );

        Ok(AgentOutput {
            fragment: ArtifactFragment {
                section_id: section.id.clone(),
                section_index: section.index,
                format: FormatKind::Postman,
                content: FragmentContent::Postman(folder),
            },
            tokens_input: result.tokens_input,
            tokens_output: result.tokens_output,
        })
    }
}
