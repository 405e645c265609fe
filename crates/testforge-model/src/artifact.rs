//! Fragments and consolidated artifacts
//!
//! A fragment is the validated output of one generation call: one section in
//! one format. The consolidator merges fragments into one deliverable per
//! format, in section order. Postman structures serialize directly as a
//! Collection Format v2.1.0 document.

use serde::{Deserialize, Serialize};

use crate::csv::CsvRow;
use crate::section::SectionId;

/// Postman collection schema emitted by the consolidator
pub const POSTMAN_SCHEMA_V2_1: &str =
    "https://schema.getpostman.com/json/collection/v2.1.0/collection.json";

/// Target artifact format
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Csv,
    Karate,
    Postman,
}

impl FormatKind {
    /// All formats, in the canonical csv/karate/postman order
    pub const ALL: [FormatKind; 3] = [FormatKind::Csv, FormatKind::Karate, FormatKind::Postman];
}

/// One Karate feature unit. Fragments keep their features distinct; the
/// consolidator never merges scenario content across fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarateFeature {
    /// Feature title (text after `Feature:` on the header line)
    pub title: String,
    /// Full feature text, starting at the `Feature:` line
    pub body: String,
}

/// A request inside a Postman item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostmanRequest {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// A named request item inside a folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostmanItem {
    pub name: String,
    pub request: PostmanRequest,
}

/// A collection-level variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostmanVariable {
    pub key: String,
    pub value: String,
}

/// One folder of requests, produced per section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostmanFolder {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "item")]
    pub items: Vec<PostmanItem>,
    /// Variables the fragment wants hoisted to collection level
    #[serde(rename = "variable", default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<PostmanVariable>,
}

/// Collection info block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostmanInfo {
    pub name: String,
    pub schema: String,
}

/// Root Postman collection: fragment folders as siblings, variables unioned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostmanCollection {
    pub info: PostmanInfo,
    #[serde(rename = "item")]
    pub folders: Vec<PostmanFolder>,
    #[serde(rename = "variable", default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<PostmanVariable>,
}

/// Format-specific payload of a fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentContent {
    Csv(Vec<CsvRow>),
    Karate(Vec<KarateFeature>),
    Postman(PostmanFolder),
}

/// Validated output of one generation call, tagged for later ordering.
///
/// `section_index` is the section's position in sectioner output; the
/// consolidator sorts by it so completion order never leaks into artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFragment {
    pub section_id: SectionId,
    pub section_index: usize,
    pub format: FormatKind,
    pub content: FragmentContent,
}

/// Merged CSV deliverable: one header, rows in section order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

impl CsvTable {
    /// Render as CSV text with RFC 4180 quoting
    #[must_use]
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, &self.headers);
        for row in &self.rows {
            push_csv_line(&mut out, &row.cells);
        }
        out
    }
}

fn push_csv_line(out: &mut String, cells: &[String]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\n']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

/// Merged Karate deliverable: ordered, still-distinct feature units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarateSuite {
    pub features: Vec<KarateFeature>,
}

/// Final merged output for one format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsolidatedArtifact {
    Csv(CsvTable),
    Karate(KarateSuite),
    Postman(PostmanCollection),
}

impl ConsolidatedArtifact {
    #[must_use]
    pub fn format(&self) -> FormatKind {
        match self {
            ConsolidatedArtifact::Csv(_) => FormatKind::Csv,
            ConsolidatedArtifact::Karate(_) => FormatKind::Karate,
            ConsolidatedArtifact::Postman(_) => FormatKind::Postman,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_quoting() {
        let table = CsvTable {
            headers: vec!["ID".to_string(), "Steps".to_string()],
            rows: vec![CsvRow {
                cells: vec!["TC_1".to_string(), "say \"hi\", then stop".to_string()],
            }],
        };
        let text = table.to_csv_string();
        assert_eq!(text, "ID,Steps\nTC_1,\"say \"\"hi\"\", then stop\"\n");
    }

    #[test]
    fn test_postman_collection_serializes_v21_shape() {
        let collection = PostmanCollection {
            info: PostmanInfo {
                name: "Pets API".to_string(),
                schema: POSTMAN_SCHEMA_V2_1.to_string(),
            },
            folders: vec![PostmanFolder {
                name: "pets".to_string(),
                description: None,
                items: vec![PostmanItem {
                    name: "List pets".to_string(),
                    request: PostmanRequest {
                        method: "GET".to_string(),
                        url: "{{base_url}}/pets".to_string(),
                        body: None,
                    },
                }],
                variables: vec![],
            }],
            variables: vec![PostmanVariable {
                key: "base_url".to_string(),
                value: "https://api.example.com".to_string(),
            }],
        };

        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["info"]["schema"], POSTMAN_SCHEMA_V2_1);
        assert_eq!(json["item"][0]["item"][0]["request"]["method"], "GET");
        assert_eq!(json["variable"][0]["key"], "base_url");
    }

    #[test]
    fn test_format_tokens() {
        use std::str::FromStr;
        assert_eq!(FormatKind::from_str("csv").unwrap(), FormatKind::Csv);
        assert_eq!(FormatKind::Postman.to_string(), "postman");
        assert!(FormatKind::from_str("junit").is_err());
    }
}
