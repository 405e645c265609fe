//! Tracing initialization for the CLI
//!
//! The pipeline crates emit structured `tracing` events; the binary calls
//! [`init_tracing`] once before doing any work. `RUST_LOG` overrides the
//! computed filter.

use tracing_subscriber::{
    EnvFilter,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize the global tracing subscriber.
///
/// Verbose mode turns on debug-level events for testforge crates and keeps
/// span targets visible; the default is a compact info-level format.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("testforge=debug,info")
            } else {
                EnvFilter::try_new("testforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_thread_ids(false)
                .with_line_number(false)
                .with_file(false)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
