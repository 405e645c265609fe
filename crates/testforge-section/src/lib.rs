//! Endpoint sectioning
//!
//! Partitions the endpoint set of an [`ApiSpec`] into [`Section`]s using a
//! selectable strategy. Output is deterministic: groups appear in the order
//! their key is first seen in the spec, never in hash-iteration order, so the
//! same spec + strategy + focus always yields the same sections.

use std::collections::HashMap;

use tracing::debug;

use testforge_model::{ApiSpec, Endpoint, Section, SectionId, StrategyKind};
use testforge_utils::error::SectionError;

/// Tagged-endpoint ratio at which `auto` prefers `by_tag` over `by_path`
const AUTO_TAG_THRESHOLD: f64 = 0.8;

/// Default coverage target percentage carried into each section
pub const DEFAULT_COVERAGE_TARGET: u8 = 90;

/// Parse a strategy token, mapping unknown tokens to the pipeline error type.
///
/// # Errors
///
/// Returns [`SectionError::UnknownStrategy`] for an unrecognized token.
pub fn parse_strategy(token: &str) -> Result<StrategyKind, SectionError> {
    token
        .parse()
        .map_err(|_| SectionError::UnknownStrategy { token: token.to_string() })
}

/// Sectioner with per-run knobs. Holds no mutable state; [`section`](Self::section)
/// is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct Sectioner {
    coverage_target: u8,
}

impl Default for Sectioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Sectioner {
    #[must_use]
    pub fn new() -> Self {
        Self { coverage_target: DEFAULT_COVERAGE_TARGET }
    }

    #[must_use]
    pub fn with_coverage_target(coverage_target: u8) -> Self {
        Self { coverage_target }
    }

    /// Partition the spec's endpoints into sections.
    ///
    /// `focus` entries (tags or path prefixes) pull matching endpoints into
    /// priority sections ordered first, one per focus identifier in the order
    /// given; remaining endpoints are grouped by the strategy.
    ///
    /// # Errors
    ///
    /// Returns [`SectionError::EmptySpec`] when the spec has no endpoints.
    pub fn section(
        &self,
        spec: &ApiSpec,
        strategy: StrategyKind,
        focus: Option<&[String]>,
    ) -> Result<Vec<Section>, SectionError> {
        if spec.endpoints.is_empty() {
            return Err(SectionError::EmptySpec { title: spec.title.clone() });
        }

        let effective = self.resolve_auto(spec, strategy);
        debug!(
            strategy = %strategy,
            effective = %effective,
            endpoints = spec.endpoints.len(),
            "sectioning spec"
        );

        let mut sections = Vec::new();
        let mut remaining: Vec<&Endpoint> = spec.endpoints.iter().collect();

        if let Some(focus_ids) = focus {
            for focus_id in focus_ids {
                let (focused, rest): (Vec<&Endpoint>, Vec<&Endpoint>) = remaining
                    .into_iter()
                    .partition(|ep| endpoint_matches_focus(ep, focus_id));
                remaining = rest;
                if !focused.is_empty() {
                    sections.push(self.build_section(
                        &format!("focus {focus_id}"),
                        format!("Priority section for focus area '{focus_id}'"),
                        focused,
                        sections.len(),
                    ));
                }
            }
        }

        for (key, group) in group_endpoints(&remaining, effective) {
            let description = describe_group(effective, &key, group.len());
            sections.push(self.build_section(&key, description, group, sections.len()));
        }

        Ok(sections)
    }

    fn resolve_auto(&self, spec: &ApiSpec, strategy: StrategyKind) -> StrategyKind {
        match strategy {
            StrategyKind::Auto => {
                if spec.tagged_ratio() >= AUTO_TAG_THRESHOLD {
                    StrategyKind::ByTag
                } else {
                    StrategyKind::ByPath
                }
            }
            other => other,
        }
    }

    fn build_section(
        &self,
        name: &str,
        description: String,
        endpoints: Vec<&Endpoint>,
        index: usize,
    ) -> Section {
        Section {
            id: SectionId::from_key(name),
            index,
            name: name.to_string(),
            description,
            coverage_target: self.coverage_target,
            endpoints: endpoints.into_iter().cloned().collect(),
        }
    }
}

fn endpoint_matches_focus(ep: &Endpoint, focus_id: &str) -> bool {
    ep.tags.iter().any(|t| t == focus_id) || ep.path.starts_with(focus_id)
}

/// Group endpoints by the strategy's key, preserving first-seen key order.
fn group_endpoints<'a>(
    endpoints: &[&'a Endpoint],
    strategy: StrategyKind,
) -> Vec<(String, Vec<&'a Endpoint>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Endpoint>> = HashMap::new();

    for ep in endpoints {
        let key = group_key(ep, strategy);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(ep);
    }

    order
        .into_iter()
        .map(|key| {
            let group = groups.remove(&key).unwrap_or_default();
            (key, group)
        })
        .collect()
}

fn group_key(ep: &Endpoint, strategy: StrategyKind) -> String {
    match strategy {
        StrategyKind::ByTag => ep.primary_tag().unwrap_or("untagged").to_string(),
        StrategyKind::ByPath => ep.root_segment().to_string(),
        StrategyKind::ByMethod => ep.method.to_string(),
        StrategyKind::ByComplexity => complexity_bucket(ep).to_string(),
        // resolved before grouping
        StrategyKind::Auto => unreachable!("auto strategy must be resolved before grouping"),
    }
}

fn complexity_bucket(ep: &Endpoint) -> &'static str {
    match ep.complexity_score() {
        0..=2 => "simple",
        3..=5 => "moderate",
        _ => "complex",
    }
}

fn describe_group(strategy: StrategyKind, key: &str, count: usize) -> String {
    let noun = if count == 1 { "endpoint" } else { "endpoints" };
    match strategy {
        StrategyKind::ByTag => format!("{count} {noun} tagged '{key}'"),
        StrategyKind::ByPath => format!("{count} {noun} under path root '{key}'"),
        StrategyKind::ByMethod => format!("{count} {key} {noun}"),
        StrategyKind::ByComplexity => format!("{count} {key}-complexity {noun}"),
        StrategyKind::Auto => unreachable!("auto strategy must be resolved before grouping"),
    }
}
