//! Parsed API specification model
//!
//! The loader (an external-collaborator seam in the root crate) produces an
//! [`ApiSpec`] from a Swagger/OpenAPI document. Endpoints keep their document
//! order; that order is what the sectioner's determinism guarantee is anchored
//! to.

use serde::{Deserialize, Serialize};

/// HTTP method of an endpoint
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
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

/// A single parameter of an endpoint (path, query, header, or body)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name as it appears in the document
    pub name: String,
    /// Location token (`path`, `query`, `header`, `body`)
    pub location: String,
    /// Whether the document marks the parameter required
    pub required: bool,
    /// Schema type token when present (`string`, `integer`, ...)
    pub schema_type: Option<String>,
}

/// One path + method pair from the API document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Request path, e.g. `/users/{id}`
    pub path: String,
    /// HTTP method
    pub method: HttpMethod,
    /// `operationId` when the document carries one
    pub operation_id: Option<String>,
    /// Tags in document order
    pub tags: Vec<String>,
    /// Declared parameters
    pub parameters: Vec<Parameter>,
    /// Name of the request body schema, when referenced
    pub request_schema: Option<String>,
    /// Name of the primary response schema, when referenced
    pub response_schema: Option<String>,
    /// Summary or description text (may contain arbitrary user content;
    /// the prompt renderer treats it as opaque data, never as template text)
    pub description: String,
}

impl Endpoint {
    /// First tag of the endpoint, if any
    #[must_use]
    pub fn primary_tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    /// First path segment after the leading slash, e.g. `users` for
    /// `/users/{id}`. Empty paths map to `/`.
    #[must_use]
    pub fn root_segment(&self) -> &str {
        let trimmed = self.path.trim_start_matches('/');
        match trimmed.split('/').next() {
            Some(seg) if !seg.is_empty() => seg,
            _ => "/",
        }
    }

    /// Rough complexity score used by the `by_complexity` strategy:
    /// one point per parameter, two per referenced schema.
    #[must_use]
    pub fn complexity_score(&self) -> usize {
        let schema_refs =
            usize::from(self.request_schema.is_some()) + usize::from(self.response_schema.is_some());
        self.parameters.len() + schema_refs * 2
    }

    /// `GET /users/{id}` style display label used in prompts and reports
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// A named schema definition from the document's components/definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Schema name
    pub name: String,
    /// Property names in document order
    pub properties: Vec<String>,
}

/// Root of the parsed API document. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSpec {
    /// API title from the info block
    pub title: String,
    /// API version from the info block
    pub version: String,
    /// Endpoints in document order
    pub endpoints: Vec<Endpoint>,
    /// Named schema definitions
    pub schemas: Vec<SchemaDefinition>,
}

impl ApiSpec {
    /// Fraction of endpoints carrying at least one tag, in [0.0, 1.0].
    /// Drives the `auto` strategy's tag-vs-path decision.
    #[must_use]
    pub fn tagged_ratio(&self) -> f64 {
        if self.endpoints.is_empty() {
            return 0.0;
        }
        let tagged = self.endpoints.iter().filter(|e| !e.tags.is_empty()).count();
        tagged as f64 / self.endpoints.len() as f64
    }
}
