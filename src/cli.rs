//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, init, validate, health, scrub), and their
//! associated argument structs. Every `run` flag has an environment
//! variable equivalent for container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::rewrite::{BodyEncoding, Placeholders};

#[derive(Parser)]
#[command(
    name = "beacon-scrub",
    version,
    about = "Analytics beacon proxy that injects the project key and scrubs URL fields",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        beacon-scrub init                     Create a starter config\n  \
        beacon-scrub run                      Start with ./beacon-scrub.yaml\n  \
        beacon-scrub run -c proxy.yaml        Start with a specific config\n  \
        beacon-scrub scrub body.txt           Rewrite a captured beacon body"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Run(Box<RunArgs>),

    /// Generate a starter config file
    Init(InitArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),

    /// Rewrite a single beacon body and print the result
    Scrub(ScrubArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        beacon-scrub run                                   Auto-detect config\n  \
        beacon-scrub run -c proxy.yaml                     Specific config file\n  \
        beacon-scrub run -c proxy.yaml -p 8080 --pretty    Local dev mode\n  \
        MIXPANEL_KEY=abc beacon-scrub run                  Key from the environment")]
pub struct RunArgs {
    /// Config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Config file used when the primary one fails to load
    #[arg(long, env = "FALLBACK_CONFIG_FILE")]
    pub fallback_config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Observability --
    /// Sentry DSN (enables error tracking)
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "SENTRY_DSN", help_heading = "Observability")]
    pub sentry_dsn: Option<String>,

    /// Sentry environment tag
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "SENTRY_ENVIRONMENT", help_heading = "Observability")]
    pub sentry_environment: Option<String>,

    // -- Tuning --
    /// Upstream timeout in milliseconds, overriding `defaults.timeout`
    #[arg(long, env = "REQUEST_TIMEOUT_MS", help_heading = "Tuning")]
    pub timeout: Option<u64>,

    /// Max request body size in bytes
    #[arg(
        long,
        env = "MAX_BODY_SIZE",
        default_value_t = 1_048_576,
        help_heading = "Tuning"
    )]
    pub max_body: usize,

    /// Config file poll interval in seconds
    #[arg(
        long,
        env = "POLL_INTERVAL_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..),
        help_heading = "Tuning"
    )]
    pub poll_interval: u64,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        beacon-scrub init                          Quick start config (yaml)\n  \
        beacon-scrub init --full                   Every option, documented\n  \
        beacon-scrub init -f toml -o proxy.toml    TOML format")]
pub struct InitArgs {
    /// Output format
    #[arg(short, long, default_value = "yaml")]
    pub format: ConfigFormat,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include full documentation as comments
    #[arg(long)]
    pub full: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "beacon-scrub.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:3000")]
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        beacon-scrub scrub body.txt --key abc              Form-encoded body from a file\n  \
        echo '[{\"properties\":{}}]' | beacon-scrub scrub -e json --key abc")]
pub struct ScrubArgs {
    /// File holding the request body; reads stdin when omitted
    pub input: Option<PathBuf>,

    /// Project API key injected as `properties.token`
    #[arg(
        short,
        long,
        env = "MIXPANEL_KEY",
        hide_env_values = true,
        value_parser = clap::builder::NonEmptyStringValueParser::new()
    )]
    pub key: String,

    /// Body envelope
    #[arg(short, long, default_value = "form")]
    pub encoding: BodyEncoding,

    /// Placeholder policy for cleared fields
    #[arg(long, default_value = "realistic")]
    pub placeholders: Placeholders,

    /// Marker written by the sentinel policy
    #[arg(
        long,
        default_value = crate::rewrite::clear_list::DEFAULT_SENTINEL,
        value_parser = clap::builder::NonEmptyStringValueParser::new()
    )]
    pub sentinel: String,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
