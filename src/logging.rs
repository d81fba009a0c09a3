//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for TTY / local dev). Format
//! is auto-detected from the terminal but can be forced via `--json`
//! or `--pretty`. With the `sentry-integration` feature, warnings and
//! errors are also forwarded to Sentry as breadcrumbs and events.

use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// Filter for `level`, with the HTTP plumbing crates capped at `warn`
/// unless tracing is explicitly requested.
#[must_use]
pub fn filter_for(level: &LogLevel) -> Targets {
    let tracing_level = level.to_tracing_level();
    let noisy = if matches!(level, LogLevel::Trace) {
        tracing::Level::TRACE
    } else {
        tracing::Level::WARN
    };
    Targets::new()
        .with_default(tracing_level)
        .with_target("hyper_util", noisy)
        .with_target("rustls", noisy)
}

pub fn init(level: &LogLevel, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(filter_for(level));

    #[cfg(feature = "sentry-integration")]
    let registry = registry.with(sentry_tracing::layer());

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(false))
            .init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_wins() {
        assert_eq!(resolve_format(false, true), LogFormat::Json);
    }

    #[test]
    fn pretty_flag_forces_pretty() {
        assert_eq!(resolve_format(true, false), LogFormat::Pretty);
    }

    #[test]
    fn plumbing_crates_quiet_below_trace() {
        let filter = filter_for(&LogLevel::Debug);
        assert!(filter.would_enable("beacon_scrub", &tracing::Level::DEBUG));
        assert!(!filter.would_enable("hyper_util", &tracing::Level::DEBUG));
        assert!(filter.would_enable("hyper_util", &tracing::Level::WARN));

        let filter = filter_for(&LogLevel::Trace);
        assert!(filter.would_enable("hyper_util", &tracing::Level::TRACE));
    }
}
