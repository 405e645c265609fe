//! CLI argument surface and dispatch
//!
//! `run()` owns all output, including error reporting; `main` only maps the
//! returned [`ExitCode`] to the process exit status.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use testforge_config::{CliOverrides, Config};
use testforge_engine::{Engine, GenerationPlan, PairStatus, RunOutcome};
use testforge_model::{ConsolidatedArtifact, FormatKind, Section, SectionId};
use testforge_section::Sectioner;
use testforge_utils::error::{ConfigError, TestForgeError};
use testforge_utils::exit_codes::ExitCode;
use testforge_utils::logging::init_tracing;

#[derive(Parser)]
#[command(
    name = "testforge",
    version,
    about = "Generate API test artifacts from Swagger/OpenAPI documents with LLM agents",
    long_about = "Generate API test artifacts from Swagger/OpenAPI documents with LLM agents.\n\n\
        The document's endpoints are partitioned into sections, one generation\n\
        call runs per section and output format, and fragments are consolidated\n\
        into a QMetry-importable CSV, Karate feature files, and a Postman\n\
        collection.\n\n\
        Examples:\n  \
        testforge generate --swagger api.yaml\n  \
        testforge generate --swagger api.json --sections by_tag --formats csv,postman\n  \
        testforge generate --swagger api.yaml --focus users,orders --fail-fast\n  \
        testforge sections --swagger api.yaml --sections by_complexity"
)]
pub struct Cli {
    /// Enable debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Explicit config file path (skips .testforge/config.toml discovery)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate test artifacts for an API document
    Generate {
        /// Path to the Swagger/OpenAPI document (JSON or YAML)
        #[arg(long, value_name = "PATH")]
        swagger: PathBuf,

        /// Sectioning strategy: by_tag, by_path, by_method, by_complexity, auto
        #[arg(long = "sections", value_name = "STRATEGY")]
        strategy: Option<String>,

        /// Comma-separated output formats: csv, karate, postman
        #[arg(long, value_delimiter = ',', value_name = "FORMATS")]
        formats: Option<Vec<String>>,

        /// Comma-separated focus identifiers (tags or path prefixes) pulled
        /// into priority sections
        #[arg(long, value_delimiter = ',', value_name = "IDS")]
        focus: Option<Vec<String>>,

        /// Output directory for generated artifacts
        #[arg(long, default_value = "testforge-out", value_name = "DIR")]
        out: PathBuf,

        /// Abort all in-flight generation on the first permanent failure
        #[arg(long)]
        fail_fast: bool,

        /// Print the sectioning and generation plan without calling any backend
        #[arg(long)]
        dry_run: bool,

        /// LLM provider: anthropic, openrouter, mock
        #[arg(long, value_name = "PROVIDER")]
        provider: Option<String>,

        /// Maximum simultaneous generation calls
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Transport retry budget per section/format pair
        #[arg(long, value_name = "N")]
        retries: Option<u32>,
    },

    /// Preview how a document would be sectioned, without generating anything
    Sections {
        /// Path to the Swagger/OpenAPI document (JSON or YAML)
        #[arg(long, value_name = "PATH")]
        swagger: PathBuf,

        /// Sectioning strategy: by_tag, by_path, by_method, by_complexity, auto
        #[arg(long = "sections", value_name = "STRATEGY")]
        strategy: Option<String>,

        /// Comma-separated focus identifiers
        #[arg(long, value_delimiter = ',', value_name = "IDS")]
        focus: Option<Vec<String>>,
    },
}

/// Parse arguments, dispatch, and report errors. Returns the exit code for
/// `main` to apply; all printing happens here.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();
    let _ = init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Generate {
            swagger,
            strategy,
            formats,
            focus,
            out,
            fail_fast,
            dry_run,
            provider,
            concurrency,
            retries,
        } => {
            let overrides = build_overrides(
                strategy.as_deref(),
                formats.as_deref(),
                focus,
                Some(fail_fast),
                provider,
                concurrency,
                retries,
            );
            overrides.and_then(|overrides| {
                generate(&swagger, cli.config.as_deref(), &overrides, &out, dry_run)
            })
        }
        Commands::Sections { swagger, strategy, focus } => {
            let overrides =
                build_overrides(strategy.as_deref(), None, focus, None, None, None, None);
            overrides.and_then(|overrides| {
                preview_sections(&swagger, cli.config.as_deref(), &overrides)
            })
        }
    };

    result.map_err(|err| {
        eprintln!("error: {err}");
        err.to_exit_code()
    })
}

fn build_overrides(
    strategy: Option<&str>,
    formats: Option<&[String]>,
    focus: Option<Vec<String>>,
    fail_fast: Option<bool>,
    provider: Option<String>,
    concurrency: Option<usize>,
    retries: Option<u32>,
) -> Result<CliOverrides, TestForgeError> {
    let strategy = strategy
        .map(testforge_section::parse_strategy)
        .transpose()?;
    let formats = formats.map(parse_formats).transpose()?;
    Ok(CliOverrides {
        strategy,
        formats,
        focus,
        concurrency_limit: concurrency,
        retry_limit: retries,
        fail_fast,
        provider,
    })
}

fn parse_formats(tokens: &[String]) -> Result<Vec<FormatKind>, TestForgeError> {
    tokens
        .iter()
        .map(|token| {
            FormatKind::from_str(token).map_err(|_| {
                ConfigError::InvalidValue {
                    field: "formats".to_string(),
                    reason: format!(
                        "unknown format '{token}'. Available formats: csv, karate, postman"
                    ),
                }
                .into()
            })
        })
        .collect()
}

fn load_config(
    explicit: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<Config, TestForgeError> {
    let mut config = match explicit {
        Some(path) => Config::load(path)?,
        None => Config::discover(&std::env::current_dir()?)?,
    };
    config.apply_overrides(overrides);
    config.validate()?;
    Ok(config)
}

fn section_spec(
    swagger: &Path,
    config: &Config,
) -> Result<(testforge_model::ApiSpec, Vec<Section>), TestForgeError> {
    let spec = crate::loader::load_spec(swagger)?;
    let focus = (!config.generation.focus.is_empty()).then_some(&config.generation.focus[..]);
    let sections = Sectioner::with_coverage_target(config.generation.coverage_target)
        .section(&spec, config.generation.strategy, focus)?;
    Ok((spec, sections))
}

fn generate(
    swagger: &Path,
    config_path: Option<&Path>,
    overrides: &CliOverrides,
    out: &Path,
    dry_run: bool,
) -> Result<(), TestForgeError> {
    let config = load_config(config_path, overrides)?;
    let (spec, sections) = section_spec(swagger, &config)?;
    let plan = GenerationPlan::new(&sections, &config.generation.formats);

    println!(
        "{} v{}: {} sections, {} generation calls",
        spec.title,
        spec.version,
        sections.len(),
        plan.len()
    );

    if dry_run {
        print_sections(&sections);
        for (section, format) in &plan.pairs {
            println!("  would generate {format} for section '{}'", section.id);
        }
        return Ok(());
    }

    let backend: Arc<dyn testforge_llm::LlmBackend> =
        Arc::from(testforge_llm::from_config(&config)?);
    let engine = Engine::from_config(&config);

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(engine.run(plan, backend, &spec.title))?;

    let written = write_artifacts(out, &outcome.artifacts)?;
    for path in &written {
        println!("wrote {}", path.display());
    }
    print_report(&outcome);

    if outcome.report.failed_count() > 0 {
        for pair in &outcome.report.pairs {
            if let PairStatus::Failed { error } = &pair.status {
                eprintln!("failed: {} ({}): {error}", pair.section_id, pair.format);
            }
        }
        return Err(TestForgeError::Llm(testforge_utils::error::LlmError::Transport(
            format!(
                "{} of {} generation calls failed",
                outcome.report.failed_count(),
                outcome.report.pairs.len()
            ),
        )));
    }
    Ok(())
}

fn preview_sections(
    swagger: &Path,
    config_path: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<(), TestForgeError> {
    let config = load_config(config_path, overrides)?;
    let (spec, sections) = section_spec(swagger, &config)?;
    println!("{} v{}: {} sections", spec.title, spec.version, sections.len());
    print_sections(&sections);
    Ok(())
}

fn print_sections(sections: &[Section]) {
    for section in sections {
        println!("[{}] {}: {}", section.index, section.id, section.description);
        for endpoint in &section.endpoints {
            println!("    {}", endpoint.label());
        }
    }
}

fn print_report(outcome: &RunOutcome) {
    let report = &outcome.report;
    println!(
        "{} succeeded ({} after retry), {} failed in {:.1}s",
        report.succeeded_count(),
        report.recovered_count(),
        report.failed_count(),
        report.duration.as_secs_f64()
    );
    if report.tokens_input > 0 || report.tokens_output > 0 {
        println!("tokens: {} in / {} out", report.tokens_input, report.tokens_output);
    }
}

/// Write consolidated artifacts under `out`: `test_cases.csv`, one
/// `.feature` file per Karate feature, and `postman_collection.json`.
fn write_artifacts(
    out: &Path,
    artifacts: &[ConsolidatedArtifact],
) -> Result<Vec<PathBuf>, TestForgeError> {
    let mut written = Vec::new();
    std::fs::create_dir_all(out)?;

    for artifact in artifacts {
        match artifact {
            ConsolidatedArtifact::Csv(table) => {
                let path = out.join("test_cases.csv");
                std::fs::write(&path, table.to_csv_string())?;
                written.push(path);
            }
            ConsolidatedArtifact::Karate(suite) => {
                let dir = out.join("karate");
                std::fs::create_dir_all(&dir)?;
                for (i, feature) in suite.features.iter().enumerate() {
                    let slug = SectionId::from_key(&feature.title);
                    let path = dir.join(format!("{i:03}_{slug}.feature"));
                    let mut body = feature.body.clone();
                    if !body.ends_with('\n') {
                        body.push('\n');
                    }
                    std::fs::write(&path, body)?;
                    written.push(path);
                }
            }
            ConsolidatedArtifact::Postman(collection) => {
                let path = out.join("postman_collection.json");
                let json = serde_json::to_string_pretty(collection)
                    .map_err(std::io::Error::other)?;
                std::fs::write(&path, json)?;
                written.push(path);
            }
        }
    }
    Ok(written)
}
