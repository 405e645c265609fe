//! Swagger/OpenAPI document loader
//!
//! The external-collaborator seam of the pipeline: everything downstream
//! works on [`ApiSpec`], and only this module touches raw documents. The
//! loader is deliberately lenient: it extracts paths, methods, tags,
//! parameters, and schema references and ignores everything else, so
//! documents with vendor extensions or fields from either Swagger 2.0 or
//! OpenAPI 3.x load the same way.
//!
//! Endpoint order follows document order; the sectioner's determinism
//! guarantee is anchored to it.

use std::path::Path;
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use testforge_model::{ApiSpec, Endpoint, HttpMethod, Parameter, SchemaDefinition};
use testforge_utils::error::TestForgeError;

/// Load and parse an API document from disk.
///
/// YAML and JSON are both accepted; the format is chosen by extension with a
/// JSON-then-YAML fallback for anything else.
///
/// # Errors
///
/// Returns [`TestForgeError::SpecLoad`] when the file cannot be read or does
/// not parse as a JSON/YAML document.
pub fn load_spec(path: &Path) -> Result<ApiSpec, TestForgeError> {
    let spec_load = |reason: String| TestForgeError::SpecLoad {
        path: path.display().to_string(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| spec_load(e.to_string()))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let document: Value = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| spec_load(e.to_string()))?,
        "json" => serde_json::from_str(&text).map_err(|e| spec_load(e.to_string()))?,
        _ => serde_json::from_str(&text)
            .or_else(|_| serde_yaml::from_str(&text))
            .map_err(|e: serde_yaml::Error| spec_load(e.to_string()))?,
    };

    let spec = parse_document(&document);
    debug!(
        path = %path.display(),
        title = %spec.title,
        endpoints = spec.endpoints.len(),
        schemas = spec.schemas.len(),
        "loaded API document"
    );
    Ok(spec)
}

/// Extract an [`ApiSpec`] from a parsed document. Pure and total: whatever
/// is missing becomes an empty field, never an error.
pub fn parse_document(document: &Value) -> ApiSpec {
    let info = &document["info"];
    let title = info["title"].as_str().unwrap_or("Untitled API").to_string();
    let version = info["version"].as_str().unwrap_or("0.0.0").to_string();

    let mut endpoints = Vec::new();
    if let Some(paths) = document["paths"].as_object() {
        for (path, item) in paths {
            let Some(item) = item.as_object() else { continue };
            for (method_key, operation) in item {
                let Ok(method) = HttpMethod::from_str(method_key) else {
                    // path item keys like `parameters` and `description`
                    continue;
                };
                endpoints.push(parse_operation(path, method, operation));
            }
        }
    } else {
        warn!("document has no paths object");
    }

    ApiSpec {
        title,
        version,
        endpoints,
        schemas: parse_schemas(document),
    }
}

fn parse_operation(path: &str, method: HttpMethod, operation: &Value) -> Endpoint {
    let tags = operation["tags"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|t| t.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut parameters = Vec::new();
    let mut request_schema = None;
    if let Some(raw_params) = operation["parameters"].as_array() {
        for raw in raw_params {
            let location = raw["in"].as_str().unwrap_or("query").to_string();
            // Swagger 2.0 body parameter carries the request schema
            if location == "body" {
                request_schema = schema_ref_name(&raw["schema"]).or(request_schema);
            }
            parameters.push(Parameter {
                name: raw["name"].as_str().unwrap_or("").to_string(),
                location,
                required: raw["required"].as_bool().unwrap_or(false),
                schema_type: raw["type"]
                    .as_str()
                    .or_else(|| raw["schema"]["type"].as_str())
                    .map(str::to_string),
            });
        }
    }

    // OpenAPI 3.x request body
    if request_schema.is_none() {
        request_schema = first_content_schema(&operation["requestBody"]);
    }

    let response_schema = success_response_schema(&operation["responses"]);

    let description = operation["summary"]
        .as_str()
        .or_else(|| operation["description"].as_str())
        .unwrap_or("")
        .to_string();

    Endpoint {
        path: path.to_string(),
        method,
        operation_id: operation["operationId"].as_str().map(str::to_string),
        tags,
        parameters,
        request_schema,
        response_schema,
        description,
    }
}

/// Schema referenced by the first 2xx response, either form
fn success_response_schema(responses: &Value) -> Option<String> {
    let responses = responses.as_object()?;
    for (status, response) in responses {
        if !status.starts_with('2') {
            continue;
        }
        // Swagger 2.0 puts the schema directly on the response
        if let Some(name) = schema_ref_name(&response["schema"]) {
            return Some(name);
        }
        if let Some(name) = first_content_schema(response) {
            return Some(name);
        }
    }
    None
}

/// Schema referenced by the first media type of an OpenAPI 3.x
/// content-carrying object (request body or response)
fn first_content_schema(value: &Value) -> Option<String> {
    let content = value["content"].as_object()?;
    content
        .values()
        .find_map(|media| schema_ref_name(&media["schema"]))
}

/// Last path segment of a `$ref`, e.g. `User` from
/// `#/components/schemas/User`. Arrays resolve to their item schema.
fn schema_ref_name(schema: &Value) -> Option<String> {
    if let Some(reference) = schema["$ref"].as_str() {
        return reference.rsplit('/').next().map(str::to_string);
    }
    if schema["type"].as_str() == Some("array") {
        return schema_ref_name(&schema["items"]);
    }
    None
}

/// Named schemas from `components.schemas` (3.x) or `definitions` (2.0)
fn parse_schemas(document: &Value) -> Vec<SchemaDefinition> {
    let table = document["components"]["schemas"]
        .as_object()
        .or_else(|| document["definitions"].as_object());
    let Some(table) = table else { return vec![] };

    table
        .iter()
        .map(|(name, schema)| SchemaDefinition {
            name: name.clone(),
            properties: schema["properties"]
                .as_object()
                .map(|props| props.keys().cloned().collect())
                .unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENAPI_V3: &str = r##"{
        "openapi": "3.0.0",
        "info": {"title": "Pet Store", "version": "1.2.0"},
        "paths": {
            "/pets": {
                "get": {
                    "operationId": "listPets",
                    "tags": ["pets"],
                    "summary": "List all pets",
                    "parameters": [
                        {"name": "limit", "in": "query", "required": false,
                         "schema": {"type": "integer"}}
                    ],
                    "responses": {
                        "200": {
                            "content": {
                                "application/json": {
                                    "schema": {"type": "array",
                                               "items": {"$ref": "#/components/schemas/Pet"}}
                                }
                            }
                        }
                    }
                },
                "post": {
                    "tags": ["pets"],
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/Pet"}
                            }
                        }
                    },
                    "responses": {"201": {"description": "created"}}
                }
            },
            "/health": {
                "get": {"responses": {"200": {"description": "ok"}}}
            }
        },
        "components": {
            "schemas": {
                "Pet": {"type": "object", "properties": {"id": {}, "name": {}}}
            }
        }
    }"##;

    const SWAGGER_V2: &str = r##"
swagger: "2.0"
info:
  title: Orders API
  version: "2.0"
paths:
  /orders:
    post:
      tags: [orders]
      parameters:
        - name: order
          in: body
          required: true
          schema:
            $ref: "#/definitions/Order"
      responses:
        "200":
          schema:
            $ref: "#/definitions/Order"
definitions:
  Order:
    properties:
      id: {}
"##;

    #[test]
    fn test_parse_openapi_v3_document() {
        let document: Value = serde_json::from_str(OPENAPI_V3).unwrap();
        let spec = parse_document(&document);

        assert_eq!(spec.title, "Pet Store");
        assert_eq!(spec.version, "1.2.0");
        assert_eq!(spec.endpoints.len(), 3);

        let list = &spec.endpoints[0];
        assert_eq!(list.label(), "GET /pets");
        assert_eq!(list.operation_id.as_deref(), Some("listPets"));
        assert_eq!(list.tags, vec!["pets"]);
        assert_eq!(list.parameters.len(), 1);
        assert_eq!(list.parameters[0].schema_type.as_deref(), Some("integer"));
        assert_eq!(list.response_schema.as_deref(), Some("Pet"));
        assert_eq!(list.description, "List all pets");

        let create = &spec.endpoints[1];
        assert_eq!(create.method, HttpMethod::Post);
        assert_eq!(create.request_schema.as_deref(), Some("Pet"));

        assert_eq!(spec.schemas.len(), 1);
        assert_eq!(spec.schemas[0].properties, vec!["id", "name"]);
    }

    #[test]
    fn test_endpoints_keep_document_order() {
        let document: Value = serde_json::from_str(OPENAPI_V3).unwrap();
        let spec = parse_document(&document);
        let labels: Vec<String> = spec.endpoints.iter().map(Endpoint::label).collect();
        assert_eq!(labels, ["GET /pets", "POST /pets", "GET /health"]);
    }

    #[test]
    fn test_parse_swagger_v2_yaml() {
        let document: Value = serde_yaml::from_str(SWAGGER_V2).unwrap();
        let spec = parse_document(&document);

        assert_eq!(spec.title, "Orders API");
        assert_eq!(spec.endpoints.len(), 1);
        let create = &spec.endpoints[0];
        assert_eq!(create.request_schema.as_deref(), Some("Order"));
        assert_eq!(create.response_schema.as_deref(), Some("Order"));
        assert_eq!(create.parameters[0].location, "body");
        assert_eq!(spec.schemas.len(), 1);
    }

    #[test]
    fn test_lenient_on_missing_fields() {
        let document: Value = serde_json::from_str(r#"{"paths": {}}"#).unwrap();
        let spec = parse_document(&document);
        assert_eq!(spec.title, "Untitled API");
        assert!(spec.endpoints.is_empty());
        assert!(spec.schemas.is_empty());
    }

    #[test]
    fn test_non_method_path_item_keys_ignored() {
        let document: Value = serde_json::from_str(
            r#"{"paths": {"/a": {"description": "shared", "get": {}}}}"#,
        )
        .unwrap();
        let spec = parse_document(&document);
        assert_eq!(spec.endpoints.len(), 1);
    }

    #[test]
    fn test_load_rejects_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_spec(&path).unwrap_err();
        assert!(matches!(err, TestForgeError::SpecLoad { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_spec(Path::new("/nonexistent/spec.json")).unwrap_err();
        assert_eq!(err.to_exit_code().as_i32(), 1);
    }
}
