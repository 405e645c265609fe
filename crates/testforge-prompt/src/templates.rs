//! Built-in prompt templates, one system prompt and one generation template
//! per artifact format.
//!
//! Generation templates use the binding names produced by
//! [`section_bindings`](crate::section_bindings). The CSV and Postman
//! templates ask for structured JSON because their agents validate shape by
//! parsing; the Karate template asks for plain feature text.

use testforge_model::FormatKind;

const CSV_SYSTEM: &str = "\
You are a senior QA engineer producing test cases for QMetry import. \
You respond with a single JSON object and nothing else: no prose, no \
markdown fences.";

const CSV_GENERATION: &str = r#"Generate API test cases for the section below.

Section: {{section_name}}
Description: {{section_description}}
Endpoints ({{endpoint_count}}):
{{endpoint_list}}
Coverage target: {{coverage_target}}% of endpoints must have at least one test case.

Respond with a JSON object of the form:
{"test_cases": [{"test_case_id": "TC_<SECTION>_<NNN>", "test_case_name": "...",
"test_case_description": "...", "module": "...", "test_type": "Functional|Integration|Negative|Security|Performance|Boundary",
"priority": "High|Medium|Low", "estimated_time": "15", "preconditions": "...",
"test_steps": "...", "expected_results": "...", "test_data": "...", "tags": "..."}]}

Cover happy paths, negative cases, and boundary values. Test case IDs must be
unique within the section."#;

const KARATE_SYSTEM: &str = "\
You are a senior automation engineer writing Karate DSL feature files. \
You respond with feature file content only: no prose, no markdown fences.";

const KARATE_GENERATION: &str = r#"Write Karate feature files for the section below.

Section: {{section_name}}
Description: {{section_description}}
Endpoints ({{endpoint_count}}):
{{endpoint_list}}
Coverage target: {{coverage_target}}%.

Produce at least one `Feature:` block per endpoint. Each feature starts on its
own `Feature:` line, uses `Background:` for shared setup, and asserts status
codes and response shapes with `match`."#;

const POSTMAN_SYSTEM: &str = "\
You are a senior API engineer building Postman collections. You respond with \
a single JSON object and nothing else: no prose, no markdown fences.";

const POSTMAN_GENERATION: &str = r#"Build a Postman folder for the section below.

Section: {{section_name}}
Description: {{section_description}}
Endpoints ({{endpoint_count}}):
{{endpoint_list}}
Coverage target: {{coverage_target}}%.

Respond with a JSON object of the form:
{"name": "{{section_name}}", "item": [{"name": "...", "request": {"method": "GET",
"url": "{{base_url}}/path"}}], "variable": [{"key": "base_url", "value": "..."}]}

One item per request variant. Use {{base_url}} as the host variable in URLs."#;

/// System prompt for a format's generation agent
#[must_use]
pub fn system_prompt(format: FormatKind) -> &'static str {
    match format {
        FormatKind::Csv => CSV_SYSTEM,
        FormatKind::Karate => KARATE_SYSTEM,
        FormatKind::Postman => POSTMAN_SYSTEM,
    }
}

/// Generation template for a format, with `{{name}}` placeholders
#[must_use]
pub fn generation_template(format: FormatKind) -> &'static str {
    match format {
        FormatKind::Csv => CSV_GENERATION,
        FormatKind::Karate => KARATE_GENERATION,
        FormatKind::Postman => POSTMAN_GENERATION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholders;

    #[test]
    fn test_generation_templates_use_standard_bindings() {
        let standard = [
            "section_name",
            "section_description",
            "endpoint_count",
            "endpoint_list",
            "coverage_target",
            "format",
            // base_url is rendered by Postman at request time, but appears as
            // literal text in prompts, so it must be bound too
            "base_url",
        ];
        for format in FormatKind::ALL {
            for name in placeholders(generation_template(format)) {
                assert!(
                    standard.contains(&name.as_str()),
                    "template for {format} uses unknown placeholder {{{{{name}}}}}"
                );
            }
        }
    }
}
