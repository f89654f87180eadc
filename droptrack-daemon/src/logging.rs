//! Tracing setup for droptrack-daemon.
//!
//! The configured level applies to the droptrack crates only; everything
//! else (tokio, the metrics exporter) stays at `warn` so a `debug` session
//! shows tailer and aggregator detail without dependency noise.
//! `RUST_LOG`, when set, replaces the computed filter entirely.

use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use droptrack_core::config::GeneralConfig;

/// Level used for crates outside the workspace.
const DEPENDENCY_LEVEL: &str = "warn";

/// Crates whose level follows `general.log_level`.
const DROPTRACK_TARGETS: [&str; 3] = ["droptrack_core", "droptrack_log_pipeline", "droptrack_daemon"];

/// Output format of the daemon log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            )),
        }
    }
}

/// Filter directives for the given level: `warn` globally, `level` for droptrack.
pub fn default_directives(level: &str) -> String {
    std::iter::once(DEPENDENCY_LEVEL.to_owned())
        .chain(DROPTRACK_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", EnvFilter::DEFAULT_ENV, e));
    }
    EnvFilter::try_new(default_directives(level))
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", level, e))
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_thread_names(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_thread_names(true)
            .boxed(),
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once, before the orchestrator is built. Thread names are included
/// so lines from the `droptrack-tailer` worker can be told apart.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    let filter = build_filter(&config.log_level)?;

    tracing_subscriber::registry()
        .with(fmt_layer(format))
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))
}
