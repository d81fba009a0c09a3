//! Privacy-sensitive event properties and their replacement values.
//!
//! Two placeholder policies exist. [`Placeholders::Sentinel`] replaces the
//! three URL-derived properties with one marker string.
//! [`Placeholders::Realistic`] additionally covers the `$initial_*`
//! properties and uses a plausible URL per field, so downstream dashboards
//! keep working with well-formed values.

use serde::{Deserialize, Serialize};

/// Marker written by the sentinel policy unless the config overrides it.
pub const DEFAULT_SENTINEL: &str = "CLEARED_BY_MIXPANEL_PROXY";

const SENTINEL_FIELDS: &[&str] = &["$referrer", "$referring_domain", "$current_url"];

const REALISTIC_FIELDS: &[(&str, &str)] = &[
    ("$referrer", "https://example.com"),
    ("$referring_domain", "example.com"),
    (
        "$current_url",
        "https://example.com:1443/admin#/status/dashboard",
    ),
    ("$initial_referrer", "https://example.com:1443/admin"),
    ("$initial_referring_domain", "example.com"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Placeholders {
    /// Per-field example URLs, including the `$initial_*` properties.
    #[default]
    Realistic,
    /// One marker string for referrer, referring domain and current URL.
    Sentinel,
}

/// One property to overwrite and the value written in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearField {
    pub key: &'static str,
    pub value: String,
}

/// Ordered list of properties cleared from every event.
///
/// Built once per loaded config and shared by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearList {
    fields: Vec<ClearField>,
}

impl ClearList {
    #[must_use]
    pub fn new(placeholders: Placeholders, sentinel: &str) -> Self {
        let fields = match placeholders {
            Placeholders::Realistic => REALISTIC_FIELDS
                .iter()
                .map(|&(key, value)| ClearField {
                    key,
                    value: value.to_string(),
                })
                .collect(),
            Placeholders::Sentinel => SENTINEL_FIELDS
                .iter()
                .map(|&key| ClearField {
                    key,
                    value: sentinel.to_string(),
                })
                .collect(),
        };
        Self { fields }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClearField> {
        self.fields.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.key == key)
    }
}
