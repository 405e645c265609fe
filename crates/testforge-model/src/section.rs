//! Sections and sectioning strategy tokens

use serde::{Deserialize, Serialize};

use crate::spec::Endpoint;

/// Stable identifier for a section, derived from the grouping key
/// (e.g. `users` for a tag group, `complex` for a complexity bucket).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionId(String);

impl SectionId {
    /// Build an id from a grouping key, slugified to lowercase with
    /// non-alphanumeric runs collapsed to single underscores.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        let mut slug = String::with_capacity(key.len());
        let mut last_was_sep = true;
        for ch in key.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
                last_was_sep = false;
            } else if !last_was_sep {
                slug.push('_');
                last_was_sep = true;
            }
        }
        let slug = slug.trim_end_matches('_');
        if slug.is_empty() {
            Self("section".to_string())
        } else {
            Self(slug.to_string())
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cohesive subset of endpoints processed together for artifact generation.
///
/// Created by the sectioner, consumed by generation agents, never mutated
/// after creation. `index` is the section's position in sectioner output and
/// is the ordering key the consolidator reassembles fragments by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Stable identifier derived from the grouping key
    pub id: SectionId,
    /// Position in sectioner output (0-based)
    pub index: usize,
    /// Human-readable name (the grouping key as seen in the document)
    pub name: String,
    /// Description used in prompts
    pub description: String,
    /// Coverage target percentage for generated tests
    pub coverage_target: u8,
    /// Endpoints in this section, in spec order
    pub endpoints: Vec<Endpoint>,
}

impl Section {
    /// Multi-line `METHOD /path: description` listing used in prompt bindings
    #[must_use]
    pub fn endpoint_listing(&self) -> String {
        let mut out = String::new();
        for ep in &self.endpoints {
            out.push_str(&ep.label());
            if !ep.description.is_empty() {
                out.push_str(": ");
                out.push_str(&ep.description);
            }
            out.push('\n');
        }
        out
    }
}

/// Sectioning strategy tokens accepted on the CLI and in config.
///
/// `ByMethod` is the one overlapping strategy: an endpoint whose path appears
/// under several methods lands in one section per method, so the union of
/// `ByMethod` sections can be larger than the endpoint set. All other
/// strategies partition the endpoint set exactly.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Group by first tag; untagged endpoints form an `untagged` section
    ByTag,
    /// Group by first path segment
    ByPath,
    /// Group by HTTP method (overlapping: one section per method)
    ByMethod,
    /// Bucket into simple/moderate/complex by parameter and schema count
    ByComplexity,
    /// Choose `by_tag` when at least 80% of endpoints are tagged, else `by_path`
    Auto,
}
