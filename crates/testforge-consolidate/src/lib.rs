//! Fragment consolidation
//!
//! Merges per-section fragments of one format into a single deliverable.
//! Fragments arrive in completion order; the consolidator sorts by the
//! section index assigned at sectioning time, so the merged artifact is
//! identical no matter which generation call finished first.
//!
//! Conflicts are never auto-resolved. A test-case ID emitted by two sections
//! or a collection variable bound to two different values aborts the merge
//! with both sections named.

use std::collections::HashMap;

use tracing::debug;

use testforge_model::csv::default_headers;
use testforge_model::{
    ArtifactFragment, ConsolidatedArtifact, CsvTable, FormatKind, FragmentContent, KarateSuite,
    PostmanCollection, PostmanFolder, PostmanInfo, PostmanVariable, SectionId,
    POSTMAN_SCHEMA_V2_1,
};
use testforge_utils::error::ConsolidateError;

/// Merge fragments of one format into a consolidated artifact.
///
/// `collection_name` names the Postman collection (ignored for other
/// formats). Every fragment must carry `format`; a stray fragment of another
/// format is a [`ConsolidateError::FormatMismatch`].
pub fn consolidate(
    format: FormatKind,
    fragments: Vec<ArtifactFragment>,
    collection_name: &str,
) -> Result<ConsolidatedArtifact, ConsolidateError> {
    if fragments.is_empty() {
        return Err(ConsolidateError::NoFragments { format });
    }
    for fragment in &fragments {
        if fragment.format != format {
            return Err(ConsolidateError::FormatMismatch {
                section_id: fragment.section_id.clone(),
                expected: format,
                actual: fragment.format,
            });
        }
    }

    let mut ordered = fragments;
    ordered.sort_by_key(|f| f.section_index);
    debug!(%format, fragments = ordered.len(), "consolidating fragments");

    match format {
        FormatKind::Csv => consolidate_csv(ordered).map(ConsolidatedArtifact::Csv),
        FormatKind::Karate => Ok(ConsolidatedArtifact::Karate(consolidate_karate(ordered))),
        FormatKind::Postman => consolidate_postman(ordered, collection_name)
            .map(ConsolidatedArtifact::Postman),
    }
}

/// One header row, data rows in section order, IDs globally unique
fn consolidate_csv(ordered: Vec<ArtifactFragment>) -> Result<CsvTable, ConsolidateError> {
    let mut seen: HashMap<String, SectionId> = HashMap::new();
    let mut rows = Vec::new();

    for fragment in ordered {
        let FragmentContent::Csv(fragment_rows) = fragment.content else {
            continue;
        };
        for row in fragment_rows {
            let id = row.test_case_id().to_string();
            if let Some(first_section) = seen.get(&id) {
                return Err(ConsolidateError::DuplicateId {
                    id,
                    first_section: first_section.clone(),
                    second_section: fragment.section_id.clone(),
                });
            }
            seen.insert(id, fragment.section_id.clone());
            rows.push(row);
        }
    }

    Ok(CsvTable { headers: default_headers(), rows })
}

/// Features stay distinct units; only their order is fixed here
fn consolidate_karate(ordered: Vec<ArtifactFragment>) -> KarateSuite {
    let mut features = Vec::new();
    for fragment in ordered {
        if let FragmentContent::Karate(fragment_features) = fragment.content {
            features.extend(fragment_features);
        }
    }
    KarateSuite { features }
}

/// Fragment folders become siblings; folder-level variables are hoisted to
/// the collection and unioned. Two sections binding the same key to the same
/// value collapse to one entry; different values are a conflict.
fn consolidate_postman(
    ordered: Vec<ArtifactFragment>,
    collection_name: &str,
) -> Result<PostmanCollection, ConsolidateError> {
    let mut folders: Vec<PostmanFolder> = Vec::new();
    let mut variables: Vec<PostmanVariable> = Vec::new();
    let mut first_binding: HashMap<String, (SectionId, String)> = HashMap::new();

    for fragment in ordered {
        let FragmentContent::Postman(mut folder) = fragment.content else {
            continue;
        };
        for variable in folder.variables.drain(..) {
            match first_binding.get(&variable.key) {
                Some((first_section, first_value)) => {
                    if *first_value != variable.value {
                        return Err(ConsolidateError::VariableConflict {
                            name: variable.key,
                            first_section: first_section.clone(),
                            first_value: first_value.clone(),
                            second_section: fragment.section_id.clone(),
                            second_value: variable.value,
                        });
                    }
                }
                None => {
                    first_binding.insert(
                        variable.key.clone(),
                        (fragment.section_id.clone(), variable.value.clone()),
                    );
                    variables.push(variable);
                }
            }
        }
        folders.push(folder);
    }

    Ok(PostmanCollection {
        info: PostmanInfo {
            name: collection_name.to_string(),
            schema: POSTMAN_SCHEMA_V2_1.to_string(),
        },
        folders,
        variables,
    })
}
