//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for errors such
//! as a missing project key, an empty sentinel, empty routes, invalid
//! paths, duplicate entries, bad HTTP methods, and malformed target URLs.
//! Returns a list of [`ValidationError`] values with per-field
//! suggestions.

use url::Url;

use super::model::{Config, MIXPANEL_KEY_ENV};
use crate::error::ValidationError;
use crate::rewrite::Placeholders;

pub const VALID_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "*",
];

/// Validate a single route path. Returns `Ok(())` or a human-readable error.
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("path cannot be empty".into());
    }
    if !path.starts_with('/') && path != "*" {
        return Err(format!(
            "path must start with '/' or be '*' (did you mean '/{path}'?)"
        ));
    }
    Ok(())
}

/// Validate a target URL template. Returns `Ok(())` or a human-readable error.
pub fn validate_target_url(url: &str) -> Result<(), String> {
    let test_url = replace_params_for_validation(url);
    match Url::parse(&test_url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

/// Validate an HTTP method string. Returns `Ok(())` or a human-readable error.
pub fn validate_method(method: &str) -> Result<(), String> {
    let upper = method.to_uppercase();
    if VALID_METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(format!("'{method}' is not a valid HTTP method"))
    }
}

fn root_error(field: &str, message: &str, suggestion: Option<String>) -> ValidationError {
    ValidationError {
        route: "(root)".into(),
        field: field.into(),
        message: message.into(),
        suggestion,
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.mixpanel_key.trim().is_empty() {
        errors.push(root_error(
            "mixpanel_key",
            "project key cannot be empty",
            Some(format!("set it in the config file or via {MIXPANEL_KEY_ENV}")),
        ));
    }

    if config.scrub.placeholders == Placeholders::Sentinel && config.scrub.sentinel.is_empty() {
        errors.push(root_error(
            "scrub.sentinel",
            "sentinel cannot be empty with the sentinel placeholder policy",
            None,
        ));
    }

    if config.routes.is_empty() {
        errors.push(root_error(
            "routes",
            "at least one route must be defined",
            None,
        ));
        return Err(errors);
    }

    let mut seen_paths = std::collections::HashSet::new();

    for (i, route) in config.routes.iter().enumerate() {
        let route_id = if route.path.is_empty() {
            format!("routes[{i}]")
        } else {
            route.path.clone()
        };

        if let Err(msg) = validate_path(&route.path) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "path".into(),
                message: msg,
                suggestion: if !route.path.is_empty() && !route.path.starts_with('/') {
                    Some(format!("did you mean '/{}'?", route.path))
                } else {
                    None
                },
            });
        }

        if !seen_paths.insert(&route.path) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "path".into(),
                message: "duplicate route path".into(),
                suggestion: None,
            });
        }

        for method in &route.methods {
            if let Err(msg) = validate_method(method) {
                errors.push(ValidationError {
                    route: route_id.clone(),
                    field: "methods".into(),
                    message: msg,
                    suggestion: None,
                });
            }
        }

        if let Err(msg) = validate_target_url(&route.target) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "target".into(),
                message: msg,
                suggestion: None,
            });
        }

        if route.timeout == Some(0) {
            errors.push(ValidationError {
                route: route_id,
                field: "timeout".into(),
                message: "timeout must be greater than 0".into(),
                suggestion: Some("omit it to use defaults.timeout".into()),
            });
        }
    }

    if config.defaults.timeout == 0 {
        errors.push(root_error(
            "defaults.timeout",
            "timeout must be greater than 0",
            None,
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Replace `:param` patterns with a valid placeholder for URL validation.
fn replace_params_for_validation(url: &str) -> String {
    let mut result = String::with_capacity(url.len());
    let mut chars = url.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == ':' && chars.peek().is_some_and(|c| c.is_alphabetic() || *c == '_') {
            result.push_str("_p");
            while chars
                .peek()
                .is_some_and(|c| c.is_alphanumeric() || *c == '_')
            {
                chars.next();
            }
        } else {
            result.push(ch);
        }
    }
    result
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!(
        "  {} routes, {} scrubbed, placeholders: {}\n",
        config.routes.len(),
        config.scrubbed_routes(),
        match config.scrub.placeholders {
            Placeholders::Realistic => "realistic",
            Placeholders::Sentinel => "sentinel",
        }
    )];

    for route in &config.routes {
        let methods = route.methods.join(", ");
        let timeout = route.timeout.map_or_else(
            || format!("{}ms (default)", config.defaults.timeout),
            |t| format!("{t}ms"),
        );

        lines.push(format!(
            "  {}  -> {}{}",
            route.path,
            route.target,
            if route.scrub { "" } else { " (pass-through)" },
        ));
        lines.push(format!("    methods: {methods}"));
        lines.push(format!("    timeout: {timeout}"));
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
