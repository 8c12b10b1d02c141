//! Tracing subscriber setup.
//!
//! Logs always go to stderr. `check` and `decode` print their results on
//! stdout, which has to stay parseable when piped.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter for one-shot commands: only problems.
pub const QUIET_FILTER: &str = "warn";

/// Filter for `serve`: verdict summaries and request traces.
pub const SERVE_FILTER: &str = "knots_checker=info,knots_filter=info,tower_http=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    /// One JSON object per line.
    Json,
}

/// `RUST_LOG` if set, else `log_level`, else `fallback`. A directive that
/// does not parse falls through to the next one.
pub fn env_filter(log_level: Option<&str>, fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or(fallback)))
        .unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init_logging(filter: EnvFilter, format: LogFormat) {
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_file(true).with_line_number(true))
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init(),
    }
    tracing::debug!(?format, "logging initialized");
}
