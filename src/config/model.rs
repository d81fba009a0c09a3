//! Serde data structures for the beacon-scrub configuration file.
//!
//! Contains [`Config`] (the root), [`ScrubSettings`], [`Route`],
//! [`Defaults`], and [`HeaderRules`]. All types derive `Serialize` and
//! `Deserialize` with `deny_unknown_fields` for strict parsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::rewrite::clear_list::{ClearList, Placeholders, DEFAULT_SENTINEL};
use crate::rewrite::{BodyEncoding, BodyRewriter};

/// Environment variable that overrides `mixpanel_key` from the file.
pub const MIXPANEL_KEY_ENV: &str = "MIXPANEL_KEY";

const fn default_timeout() -> u64 {
    5000
}

const fn default_true() -> bool {
    true
}

fn default_methods() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}

fn is_default_timeout(v: &u64) -> bool {
    *v == default_timeout()
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_default_methods(v: &[String]) -> bool {
    v.len() == 1 && v[0] == "*"
}

fn is_default_defaults(v: &Defaults) -> bool {
    v.timeout == default_timeout()
        && v.forward_headers
        && v.proxy_headers
        && v.strip_hop_by_hop
        && v.headers.is_default()
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project token written into every event. May come from the environment.
    #[serde(default)]
    pub mixpanel_key: String,

    #[serde(default, skip_serializing_if = "ScrubSettings::is_default")]
    pub scrub: ScrubSettings,

    #[serde(default, skip_serializing_if = "is_default_defaults")]
    pub defaults: Defaults,

    pub routes: Vec<Route>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("mixpanel_key", &"<redacted>")
            .field("scrub", &self.scrub)
            .field("defaults", &self.defaults)
            .field("routes", &self.routes)
            .finish()
    }
}

impl Config {
    /// Replace `mixpanel_key` with `MIXPANEL_KEY` when that is set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(MIXPANEL_KEY_ENV) {
            if !key.is_empty() {
                self.mixpanel_key = key;
            }
        }
    }

    #[must_use]
    pub fn scrubbed_routes(&self) -> usize {
        self.routes.iter().filter(|r| r.scrub).count()
    }

    #[must_use]
    pub fn build_rewriter(&self) -> BodyRewriter {
        BodyRewriter::new(
            self.mixpanel_key.clone(),
            ClearList::new(self.scrub.placeholders, &self.scrub.sentinel),
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScrubSettings {
    #[serde(default)]
    pub placeholders: Placeholders,

    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    /// Envelope assumed when `Content-Type` does not say.
    #[serde(default)]
    pub default_encoding: BodyEncoding,
}

impl Default for ScrubSettings {
    fn default() -> Self {
        Self {
            placeholders: Placeholders::default(),
            sentinel: default_sentinel(),
            default_encoding: BodyEncoding::default(),
        }
    }
}

impl ScrubSettings {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(
        default = "default_timeout",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: u64,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub forward_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub proxy_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub strip_hop_by_hop: bool,

    #[serde(default, skip_serializing_if = "HeaderRules::is_default")]
    pub headers: HeaderRules,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            forward_headers: default_true(),
            proxy_headers: default_true(),
            strip_hop_by_hop: default_true(),
            headers: HeaderRules::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Route {
    pub path: String,

    #[serde(
        default = "default_methods",
        skip_serializing_if = "is_default_methods"
    )]
    pub methods: Vec<String>,

    /// Upstream URL template; `:name` segments are filled from the path.
    pub target: String,

    /// Rewrite beacon bodies before forwarding.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub scrub: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "HeaderRules::is_default")]
    pub headers: HeaderRules,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRules {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub add: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strip: Vec<String>,
}

impl HeaderRules {
    fn is_default(&self) -> bool {
        self.add.is_empty() && self.strip.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_route_gets_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"mixpanel_key": "k", "routes": [{"path": "/track", "target": "https://api.mixpanel.com/track"}]}"#,
        )
        .unwrap();
        let route = &config.routes[0];
        assert!(route.scrub);
        assert_eq!(route.methods, vec!["*"]);
        assert_eq!(config.scrub, ScrubSettings::default());
        assert_eq!(config.scrub.sentinel, DEFAULT_SENTINEL);
        assert_eq!(config.defaults.timeout, 5000);
    }

    #[test]
    fn scrub_settings_parse_lowercase() {
        let settings: ScrubSettings = serde_json::from_str(
            r#"{"placeholders": "sentinel", "sentinel": "X", "default_encoding": "json"}"#,
        )
        .unwrap();
        assert_eq!(settings.placeholders, Placeholders::Sentinel);
        assert_eq!(settings.default_encoding, BodyEncoding::Json);
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<Config, _> =
            serde_json::from_str(r#"{"mixpanel_key": "k", "routes": [], "extra": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let config: Config =
            serde_json::from_str(r#"{"mixpanel_key": "very-secret", "routes": []}"#).unwrap();
        assert!(!format!("{config:?}").contains("very-secret"));
    }

    #[test]
    fn default_scrub_settings_are_not_serialized() {
        let config: Config =
            serde_json::from_str(r#"{"mixpanel_key": "k", "routes": []}"#).unwrap();
        let out = serde_json::to_value(&config).unwrap();
        assert!(out.get("scrub").is_none());
        assert!(out.get("defaults").is_none());
    }
}
