//! Generation engine
//!
//! Fans (Section, format) pairs out to the backend under a concurrency
//! bound, applies the retry policy, reassembles fragments in section order,
//! and consolidates each format whose pairs all succeeded.
//!
//! Retry policy, by error class:
//!
//! - transient LLM errors ([`LlmError::is_transient`]): retried up to
//!   `retry_limit` times with backoff
//! - malformed fragments: retried exactly once
//! - sectioning, rendering, and configuration errors: never retried
//!
//! `fail_fast` is an explicit configuration choice. When set, the first
//! permanent failure aborts all in-flight tasks and the run returns that
//! error; otherwise the run continues best-effort and the failed pair is
//! recorded in the [`RunReport`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use testforge_agents::{agent_for, AgentOutput, AgentSettings, DEFAULT_AGENT_TIMEOUT};
use testforge_config::Config;
use testforge_consolidate::consolidate;
use testforge_llm::LlmBackend;
use testforge_model::{ArtifactFragment, ConsolidatedArtifact, FormatKind, Section, SectionId};
use testforge_utils::error::{LlmError, TestForgeError};

/// Base delay before the first transport retry; grows linearly per attempt
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Ordered work list: every requested format for every section
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    pub pairs: Vec<(Section, FormatKind)>,
}

impl GenerationPlan {
    /// Pairs grouped format-major, sections in sectioner order within each
    #[must_use]
    pub fn new(sections: &[Section], formats: &[FormatKind]) -> Self {
        let mut pairs = Vec::with_capacity(sections.len() * formats.len());
        for format in formats {
            for section in sections {
                pairs.push((section.clone(), *format));
            }
        }
        Self { pairs }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Terminal state of one (section, format) pair
#[derive(Debug, Clone)]
pub enum PairStatus {
    /// Generation succeeded, possibly after retries
    Succeeded { retries: u32 },
    /// All applicable retries exhausted
    Failed { error: String },
}

/// Outcome of one pair, kept in plan order in the report
#[derive(Debug, Clone)]
pub struct PairReport {
    pub section_id: SectionId,
    pub format: FormatKind,
    pub status: PairStatus,
}

/// Summary of a full generation run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub pairs: Vec<PairReport>,
    pub duration: Duration,
    /// Token totals, summed over calls where the provider reported usage
    pub tokens_input: u64,
    pub tokens_output: u64,
}

impl RunReport {
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.pairs
            .iter()
            .filter(|p| matches!(p.status, PairStatus::Succeeded { .. }))
            .count()
    }

    /// Pairs that succeeded only after at least one retry
    #[must_use]
    pub fn recovered_count(&self) -> usize {
        self.pairs
            .iter()
            .filter(|p| matches!(p.status, PairStatus::Succeeded { retries } if retries > 0))
            .count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.pairs
            .iter()
            .filter(|p| matches!(p.status, PairStatus::Failed { .. }))
            .count()
    }
}

/// Artifacts for every fully-generated format, plus the run summary
#[derive(Debug)]
pub struct RunOutcome {
    pub artifacts: Vec<ConsolidatedArtifact>,
    pub report: RunReport,
}

/// Fragments for one format, slotted by section position and emitted only
/// when every slot is filled
struct SlotBuffer {
    slots: Vec<Option<ArtifactFragment>>,
}

impl SlotBuffer {
    fn new(len: usize) -> Self {
        Self { slots: (0..len).map(|_| None).collect() }
    }

    fn fill(&mut self, index: usize, fragment: ArtifactFragment) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(fragment);
        }
    }

    fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    fn into_fragments(self) -> Vec<ArtifactFragment> {
        self.slots.into_iter().flatten().collect()
    }
}

/// What one spawned task hands back over the join set
struct TaskResult {
    section_id: SectionId,
    format: FormatKind,
    retries: u32,
    outcome: Result<AgentOutput, TestForgeError>,
}

/// Drives the generation pipeline for one run
pub struct Engine {
    settings: AgentSettings,
    concurrency_limit: usize,
    retry_limit: u32,
    fail_fast: bool,
    retry_backoff: Duration,
}

impl Engine {
    /// Build an engine from validated configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let provider = config.llm.provider.as_deref().unwrap_or("");
        let provider_config = match provider {
            "openrouter" => config.llm.openrouter.as_ref(),
            _ => config.llm.anthropic.as_ref(),
        };
        let settings = AgentSettings {
            model: provider_config
                .and_then(|p| p.model.clone())
                .unwrap_or_default(),
            timeout: provider_config
                .and_then(|p| p.timeout_secs)
                .map_or(DEFAULT_AGENT_TIMEOUT, Duration::from_secs),
        };
        Self {
            settings,
            concurrency_limit: config.generation.concurrency_limit,
            retry_limit: config.generation.retry_limit,
            fail_fast: config.generation.fail_fast,
            retry_backoff: INITIAL_BACKOFF,
        }
    }

    /// Override the retry backoff base. Tests use a zero backoff so retry
    /// scenarios run without wall-clock delays.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Execute a plan against the backend.
    ///
    /// `collection_name` names the Postman collection when that format is in
    /// the plan.
    ///
    /// # Errors
    ///
    /// Returns the failing pair's error when `fail_fast` is set, a
    /// [`RenderError`](testforge_utils::error::RenderError) when a prompt
    /// cannot be rendered, and a
    /// [`ConsolidateError`](testforge_utils::error::ConsolidateError) when
    /// merging conflicts. Best-effort pair failures do not fail the run;
    /// they are recorded in the report.
    pub async fn run(
        &self,
        plan: GenerationPlan,
        backend: Arc<dyn LlmBackend>,
        collection_name: &str,
    ) -> Result<RunOutcome, TestForgeError> {
        let started = Instant::now();
        let section_count = plan
            .pairs
            .iter()
            .map(|(section, _)| section.index + 1)
            .max()
            .unwrap_or(0);
        let formats: Vec<FormatKind> = {
            let mut seen = Vec::new();
            for (_, format) in &plan.pairs {
                if !seen.contains(format) {
                    seen.push(*format);
                }
            }
            seen
        };
        info!(
            pairs = plan.len(),
            concurrency = self.concurrency_limit,
            retry_limit = self.retry_limit,
            fail_fast = self.fail_fast,
            "starting generation run"
        );

        // Prompts render up front: a missing binding is a structural error
        // and fails the run before anything is spawned.
        let mut work = Vec::with_capacity(plan.len());
        for (section, format) in plan.pairs {
            let bindings = testforge_prompt::section_bindings(&section, format);
            let prompt =
                testforge_prompt::render(testforge_prompt::generation_template(format), &bindings)?;
            work.push((section, format, prompt));
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut join_set: JoinSet<TaskResult> = JoinSet::new();

        for (section, format, prompt) in work {
            let semaphore = Arc::clone(&semaphore);
            let backend = Arc::clone(&backend);
            let settings = self.settings.clone();
            let retry_limit = self.retry_limit;
            let backoff = self.retry_backoff;

            join_set.spawn(async move {
                let permit = semaphore.acquire_owned().await;
                if permit.is_err() {
                    return TaskResult {
                        section_id: section.id.clone(),
                        format,
                        retries: 0,
                        outcome: Err(LlmError::Transport(
                            "concurrency gate closed".to_string(),
                        )
                        .into()),
                    };
                }
                generate_with_retry(&section, format, &prompt, backend, settings, retry_limit, backoff)
                    .await
            });
        }

        let mut buffers: Vec<(FormatKind, SlotBuffer)> = formats
            .iter()
            .map(|f| (*f, SlotBuffer::new(section_count)))
            .collect();
        let mut report = RunReport::default();

        while let Some(joined) = join_set.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    join_set.abort_all();
                    return Err(LlmError::Transport(format!("generation task failed: {e}")).into());
                }
            };

            match result.outcome {
                Ok(output) => {
                    report.tokens_input += output.tokens_input.unwrap_or(0);
                    report.tokens_output += output.tokens_output.unwrap_or(0);
                    report.pairs.push(PairReport {
                        section_id: result.section_id,
                        format: result.format,
                        status: PairStatus::Succeeded { retries: result.retries },
                    });
                    let fragment = output.fragment;
                    if let Some((_, buffer)) =
                        buffers.iter_mut().find(|(f, _)| *f == fragment.format)
                    {
                        buffer.fill(fragment.section_index, fragment);
                    }
                }
                Err(error) => {
                    warn!(
                        section = %result.section_id,
                        format = %result.format,
                        retries = result.retries,
                        %error,
                        "pair failed permanently"
                    );
                    if self.fail_fast {
                        join_set.abort_all();
                        return Err(error);
                    }
                    report.pairs.push(PairReport {
                        section_id: result.section_id,
                        format: result.format,
                        status: PairStatus::Failed { error: error.to_string() },
                    });
                }
            }
        }

        let mut artifacts = Vec::new();
        for (format, buffer) in buffers {
            if buffer.is_complete() {
                artifacts.push(consolidate(format, buffer.into_fragments(), collection_name)?);
            } else {
                debug!(%format, "skipping consolidation for incomplete format");
            }
        }

        report.duration = started.elapsed();
        info!(
            succeeded = report.succeeded_count(),
            recovered = report.recovered_count(),
            failed = report.failed_count(),
            duration_ms = report.duration.as_millis() as u64,
            "generation run finished"
        );

        Ok(RunOutcome { artifacts, report })
    }
}

/// One pair's full retry loop. Transient transport errors consume the retry
/// budget; a malformed fragment earns exactly one regeneration; anything
/// else is terminal on first sight.
async fn generate_with_retry(
    section: &Section,
    format: FormatKind,
    prompt: &str,
    backend: Arc<dyn LlmBackend>,
    settings: AgentSettings,
    retry_limit: u32,
    backoff: Duration,
) -> TaskResult {
    let agent = agent_for(format, settings);
    let mut transport_retries: u32 = 0;
    let mut malformed_retried = false;
    let mut retries: u32 = 0;

    loop {
        match agent.generate(section, prompt, backend.as_ref()).await {
            Ok(output) => {
                debug!(section = %section.id, %format, retries, "pair succeeded");
                return TaskResult {
                    section_id: section.id.clone(),
                    format,
                    retries,
                    outcome: Ok(output),
                };
            }
            Err(TestForgeError::Llm(ref e))
                if e.is_transient() && transport_retries < retry_limit =>
            {
                transport_retries += 1;
                retries += 1;
                let delay = backoff * transport_retries;
                warn!(
                    section = %section.id,
                    %format,
                    attempt = transport_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(TestForgeError::Artifact(ref e)) if !malformed_retried => {
                malformed_retried = true;
                retries += 1;
                warn!(section = %section.id, %format, error = %e, "malformed fragment, regenerating once");
            }
            Err(error) => {
                return TaskResult {
                    section_id: section.id.clone(),
                    format,
                    retries,
                    outcome: Err(error),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testforge_llm::MockBackend;
    use testforge_model::{CsvTable, Endpoint, HttpMethod};

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

    fn section(name: &str, index: usize) -> Section {
        Section {
            id: SectionId::from_key(name),
            index,
            name: name.to_string(),
            description: format!("{name} endpoints"),
            coverage_target: 90,
            endpoints: vec![endpoint(&format!("/{name}"))],
        }
    }

    fn csv_envelope(id: &str) -> String {
        serde_json::json!({
            "test_cases": [{
                "test_case_id": id,
                "test_case_name": "case",
                "test_steps": "1. call",
                "expected_results": "200"
            }]
        })
        .to_string()
    }

    const FEATURE: &str = "Feature: one\n  Scenario: ok\n    Then status 200";

    fn engine(retry_limit: u32, fail_fast: bool) -> Engine {
        let mut config = Config::default();
        config.generation.retry_limit = retry_limit;
        config.generation.fail_fast = fail_fast;
        Engine::from_config(&config).with_retry_backoff(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_full_run_consolidates_in_section_order() {
        let users = section("users", 0);
        let orders = section("orders", 1);
        let backend = Arc::new(
            MockBackend::new()
                .with_response(&users.id, FormatKind::Csv, csv_envelope("TC_USERS_001"))
                .with_response(&orders.id, FormatKind::Csv, csv_envelope("TC_ORDERS_001"))
                .with_response(&users.id, FormatKind::Karate, FEATURE)
                .with_response(&orders.id, FormatKind::Karate, FEATURE),
        );

        let plan = GenerationPlan::new(
            &[users, orders],
            &[FormatKind::Csv, FormatKind::Karate],
        );
        let outcome = engine(2, false).run(plan, backend, "api").await.unwrap();

        assert_eq!(outcome.artifacts.len(), 2);
        assert_eq!(outcome.report.succeeded_count(), 4);
        assert_eq!(outcome.report.failed_count(), 0);

        let table: &CsvTable = outcome
            .artifacts
            .iter()
            .find_map(|a| match a {
                ConsolidatedArtifact::Csv(t) => Some(t),
                _ => None,
            })
            .unwrap();
        assert_eq!(table.rows[0].test_case_id(), "TC_USERS_001");
        assert_eq!(table.rows[1].test_case_id(), "TC_ORDERS_001");
    }

    #[tokio::test]
    async fn test_transient_failures_recover_within_budget() {
        let users = section("users", 0);
        let backend = Arc::new(MockBackend::new().with_flaky_response(
            &users.id,
            FormatKind::Csv,
            2,
            csv_envelope("TC_001"),
        ));

        let plan = GenerationPlan::new(&[users.clone()], &[FormatKind::Csv]);
        let outcome = engine(2, false).run(plan, Arc::clone(&backend) as _, "api").await.unwrap();

        assert_eq!(outcome.report.succeeded_count(), 1);
        assert_eq!(outcome.report.recovered_count(), 1);
        // initial attempt + 2 retries
        assert_eq!(backend.invocation_count(&users.id, FormatKind::Csv), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_pair_best_effort() {
        let users = section("users", 0);
        let backend = Arc::new(MockBackend::new().with_flaky_response(
            &users.id,
            FormatKind::Csv,
            5,
            csv_envelope("TC_001"),
        ));

        let plan = GenerationPlan::new(&[users.clone()], &[FormatKind::Csv]);
        let outcome = engine(2, false).run(plan, Arc::clone(&backend) as _, "api").await.unwrap();

        assert_eq!(outcome.report.failed_count(), 1);
        assert!(outcome.artifacts.is_empty());
        // retry budget bounds the attempts: initial + retry_limit
        assert_eq!(backend.invocation_count(&users.id, FormatKind::Csv), 3);
    }

    #[tokio::test]
    async fn test_malformed_fragment_retried_exactly_once() {
        let users = section("users", 0);
        let backend = Arc::new(MockBackend::new().with_response(
            &users.id,
            FormatKind::Csv,
            "not json at all",
        ));

        let plan = GenerationPlan::new(&[users.clone()], &[FormatKind::Csv]);
        let outcome = engine(5, false).run(plan, Arc::clone(&backend) as _, "api").await.unwrap();

        assert_eq!(outcome.report.failed_count(), 1);
        // one regeneration, regardless of the transport retry budget
        assert_eq!(backend.invocation_count(&users.id, FormatKind::Csv), 2);
    }

    #[tokio::test]
    async fn test_fail_fast_surfaces_the_error() {
        let users = section("users", 0);
        let orders = section("orders", 1);
        let backend = Arc::new(
            MockBackend::new()
                .with_response(&users.id, FormatKind::Csv, "garbage")
                .with_response(&orders.id, FormatKind::Csv, csv_envelope("TC_001")),
        );

        let plan = GenerationPlan::new(&[users, orders], &[FormatKind::Csv]);
        let err = engine(0, true).run(plan, backend, "api").await.unwrap_err();

        assert_eq!(err.to_exit_code().as_i32(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_complete_formats() {
        let users = section("users", 0);
        let orders = section("orders", 1);
        // Karate succeeds for both sections, CSV only for one
        let backend = Arc::new(
            MockBackend::new()
                .with_response(&users.id, FormatKind::Csv, csv_envelope("TC_001"))
                .with_response(&users.id, FormatKind::Karate, FEATURE)
                .with_response(&orders.id, FormatKind::Karate, FEATURE),
        );

        let plan = GenerationPlan::new(
            &[users, orders],
            &[FormatKind::Csv, FormatKind::Karate],
        );
        let outcome = engine(0, false).run(plan, backend, "api").await.unwrap();

        assert_eq!(outcome.report.failed_count(), 1);
        assert_eq!(outcome.artifacts.len(), 1);
        assert!(matches!(outcome.artifacts[0], ConsolidatedArtifact::Karate(_)));
    }

    #[tokio::test]
    async fn test_duplicate_ids_across_sections_conflict() {
        let users = section("users", 0);
        let orders = section("orders", 1);
        let backend = Arc::new(
            MockBackend::new()
                .with_response(&users.id, FormatKind::Csv, csv_envelope("TC_001"))
                .with_response(&orders.id, FormatKind::Csv, csv_envelope("TC_001")),
        );

        let plan = GenerationPlan::new(&[users, orders], &[FormatKind::Csv]);
        let err = engine(0, false).run(plan, backend, "api").await.unwrap_err();

        assert_eq!(err.to_exit_code().as_i32(), 3);
    }

    #[test]
    fn test_plan_is_format_major() {
        let sections = [section("a", 0), section("b", 1)];
        let plan = GenerationPlan::new(&sections, &[FormatKind::Csv, FormatKind::Postman]);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.pairs[0].1, FormatKind::Csv);
        assert_eq!(plan.pairs[1].1, FormatKind::Csv);
        assert_eq!(plan.pairs[2].1, FormatKind::Postman);
    }
}
