//! Unified error types for beacon-scrub.
//!
//! Defines [`BeaconScrubError`] (the main crate error enum),
//! [`ValidationError`] for config validation failures, and
//! [`TransformError`] for beacon body rewriting failures. All use
//! `thiserror` for `Display` and `Error` derives. Error messages
//! include contextual hints to guide the user toward a fix.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub route: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.route, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

/// Which decoding step rejected a beacon body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// `application/x-www-form-urlencoded` envelope.
    Form,
    /// JSON text of the event batch.
    Json,
    /// Shape of the parsed batch (array of event objects).
    Batch,
}

impl std::fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Form => "form body",
            Self::Json => "event JSON",
            Self::Batch => "event batch",
        })
    }
}

/// Failure while rewriting a beacon body.
///
/// A rewrite that fails never produces a partial body: callers get either
/// the complete rewritten bytes or one of these.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransformError {
    #[error("unable to read body: {source}")]
    BodyRead {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unable to decode {stage}: {reason}")]
    Decode { stage: DecodeStage, reason: String },

    #[error("unable to read 'data' in body")]
    MissingDataField,

    #[error("unable to set '{field}' on event {index}: {reason}")]
    FieldSet {
        field: String,
        index: usize,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BeaconScrubError {
    #[error("No config source found.\n\n  {hint}")]
    NoConfigSource { hint: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Upstream {url} did not respond within {timeout_ms}ms")]
    UpstreamTimeout { url: String, timeout_ms: u64 },

    #[error("Beacon rewrite failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Unable to read input {}: {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),
}
