//! Concrete [`ConfigSource`](super::ConfigSource) implementations.
//!
//! File-based sources (YAML, JSON, TOML) gated by feature flags, the
//! [`parse_config_str`] helper for format-specific deserialization, and
//! [`load_str`], the shared parse-override-validate-hash pipeline.

pub mod file_source;

#[cfg(feature = "yaml")]
pub mod yaml;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "toml")]
pub mod toml_source;

use std::path::Path;

use sha2::{Digest, Sha256};

use super::ConfigSource;
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::ConfigVersion;
use crate::error::BeaconScrubError;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, BeaconScrubError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| BeaconScrubError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| BeaconScrubError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| BeaconScrubError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(BeaconScrubError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Parse `content`, apply environment overrides, validate, and hash.
///
/// The version hash covers the file content only; a changed
/// `MIXPANEL_KEY` takes effect on the next content change or restart.
pub fn load_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<(Config, ConfigVersion), BeaconScrubError> {
    let mut config = parse_config_str(ext, content, path_display)?;
    config.apply_env_overrides();

    if let Err(errors) = validate(&config) {
        return Err(BeaconScrubError::ConfigValidation { errors });
    }

    let hash = sha256_hex(content.as_bytes());
    Ok((config, ConfigVersion::Hash(hash)))
}

/// Build the file source matching `path`'s extension.
pub fn for_path(path: &Path) -> Result<Box<dyn ConfigSource>, BeaconScrubError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Box::new(yaml::new(path.to_path_buf()))),

        #[cfg(feature = "json")]
        "json" => Ok(Box::new(json::new(path.to_path_buf()))),

        #[cfg(feature = "toml")]
        "toml" => Ok(Box::new(toml_source::new(path.to_path_buf()))),

        other => Err(BeaconScrubError::UnsupportedFormat(other.to_string())),
    }
}
