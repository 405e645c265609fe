//! Prompt rendering
//!
//! [`render`] performs pure placeholder substitution: `{{name}}` tokens are
//! replaced from a binding map, scanned left to right, and the first token
//! without a binding fails the call. No expression evaluation happens inside
//! templates; endpoint descriptions flow through as opaque data, so
//! document content can never inject behavior into a prompt.

mod templates;

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use testforge_model::{FormatKind, Section};
use testforge_utils::error::RenderError;

pub use templates::{generation_template, system_prompt};

/// `{{name}}` placeholder; names are word characters only, so stray braces in
/// endpoint descriptions never look like placeholders.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

/// Ordered binding map for template rendering.
///
/// `BTreeMap` keeps iteration deterministic for logging and tests; lookup
/// order never affects output since substitution is driven by the template's
/// own left-to-right placeholder order.
pub type Bindings = BTreeMap<String, String>;

/// Render a template by substituting every `{{name}}` placeholder.
///
/// Pure function: identical inputs always produce identical output.
///
/// # Errors
///
/// Returns [`RenderError::MissingBinding`] naming the first placeholder
/// (left-to-right) that has no binding.
pub fn render(template: &str, bindings: &Bindings) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut last_end = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).expect("capture 0 always present");
        let name = &caps[1];

        let value = bindings.get(name).ok_or_else(|| RenderError::MissingBinding {
            placeholder: name.to_string(),
        })?;

        out.push_str(&template[last_end..whole.start()]);
        out.push_str(value);
        last_end = whole.end();
    }

    out.push_str(&template[last_end..]);
    Ok(out)
}

/// List placeholder names in a template, in first-appearance order,
/// deduplicated.
#[must_use]
pub fn placeholders(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Build the standard binding set for one section/format pair.
///
/// These are the names the built-in templates use: `section_name`,
/// `section_description`, `endpoint_count`, `endpoint_list`,
/// `coverage_target`, `format`.
#[must_use]
pub fn section_bindings(section: &Section, format: FormatKind) -> Bindings {
    let mut bindings = Bindings::new();
    bindings.insert("section_name".to_string(), section.name.clone());
    bindings.insert("section_description".to_string(), section.description.clone());
    bindings.insert("endpoint_count".to_string(), section.endpoints.len().to_string());
    bindings.insert("endpoint_list".to_string(), section.endpoint_listing());
    bindings.insert("coverage_target".to_string(), section.coverage_target.to_string());
    bindings.insert("format".to_string(), format.to_string());
    // Postman's variable syntax collides with placeholder syntax; binding the
    // name to its own literal lets `{{base_url}}` survive rendering untouched
    // and reach the collection as a Postman variable reference.
    bindings.insert("base_url".to_string(), "{{base_url}}".to_string());
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use testforge_model::{HttpMethod, SectionId};

    fn bindings(pairs: &[(&str, &str)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let out = render(
            "Section {{section_name}} has {{endpoint_count}} endpoints",
            &bindings(&[("section_name", "users"), ("endpoint_count", "3")]),
        )
        .unwrap();
        assert_eq!(out, "Section users has 3 endpoints");
    }

    #[test]
    fn test_render_is_pure() {
        let b = bindings(&[("a", "1")]);
        let first = render("x {{a}} y", &b).unwrap();
        let second = render("x {{a}} y", &b).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_binding_names_first_unresolved_token() {
        let err = render(
            "{{present}} then {{missing_one}} then {{missing_two}}",
            &bindings(&[("present", "ok")]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingBinding { placeholder: "missing_one".to_string() }
        );
    }

    #[test]
    fn test_no_placeholders_passes_through() {
        let out = render("plain text, no tokens", &Bindings::new()).unwrap();
        assert_eq!(out, "plain text, no tokens");
    }

    #[test]
    fn test_stray_braces_are_not_placeholders() {
        // single braces and non-word contents pass through untouched
        let out = render("path {id} and {{not a token}}", &Bindings::new()).unwrap();
        assert_eq!(out, "path {id} and {{not a token}}");
    }

    #[test]
    fn test_binding_values_are_not_rescanned() {
        // a value containing {{other}} is data, not a nested template
        let out = render(
            "{{a}}",
            &bindings(&[("a", "literal {{other}}")]),
        )
        .unwrap();
        assert_eq!(out, "literal {{other}}");
    }

    #[test]
    fn test_repeated_placeholder_substituted_each_time() {
        let out = render("{{x}} and {{x}}", &bindings(&[("x", "v")])).unwrap();
        assert_eq!(out, "v and v");
    }

    #[test]
    fn test_placeholders_listing() {
        let names = placeholders("{{b}} {{a}} {{b}}");
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_section_bindings_cover_builtin_templates() {
        let section = Section {
            id: SectionId::from_key("users"),
            index: 0,
            name: "users".to_string(),
            description: "2 endpoints tagged 'users'".to_string(),
            coverage_target: 90,
            endpoints: vec![testforge_model::Endpoint {
                path: "/users".to_string(),
                method: HttpMethod::Get,
                operation_id: None,
                tags: vec!["users".to_string()],
                parameters: vec![],
                request_schema: None,
                response_schema: None,
                description: "List users".to_string(),
            }],
        };

        for format in FormatKind::ALL {
            let b = section_bindings(&section, format);
            let rendered = render(generation_template(format), &b).unwrap();
            assert!(rendered.contains("users"));
        }
    }

    #[test]
    fn test_base_url_survives_rendering_as_postman_variable() {
        let b = bindings(&[("base_url", "{{base_url}}")]);
        let out = render("GET {{base_url}}/users", &b).unwrap();
        assert_eq!(out, "GET {{base_url}}/users");
    }
}
