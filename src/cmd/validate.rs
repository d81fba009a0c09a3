//! `beacon-scrub validate`: check a configuration file for errors.
//!
//! Parses the file, applies the `MIXPANEL_KEY` override exactly as
//! `run` would, validates, and reports the result in either
//! human-readable text or machine-readable JSON.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::sources::parse_config_str;
use crate::config::validation;
use crate::error::BeaconScrubError;

pub fn execute(args: &ValidateArgs) -> Result<(), BeaconScrubError> {
    let path = &args.config;

    if !path.exists() {
        return Err(BeaconScrubError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let mut config = parse_config_str(ext, &content, &path.display().to_string())?;
    config.apply_env_overrides();

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "route": e.route,
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(BeaconScrubError::ConfigValidation { errors });
    }

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&path.display().to_string(), &config)
            );
        }
        ValidateFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "routes": config.routes.len(),
                    "scrubbed_routes": config.scrubbed_routes(),
                    "placeholders": config.scrub.placeholders,
                })
            );
        }
    }

    Ok(())
}
