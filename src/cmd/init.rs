//! `beacon-scrub init`: generate a starter configuration file.
//!
//! Creates a YAML, JSON, or TOML config file with either minimal
//! or fully documented templates.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::BeaconScrubError;

pub fn execute(args: &InitArgs) -> Result<(), BeaconScrubError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("beacon-scrub.{}", args.format.extension())));

    if output.exists() {
        return Err(BeaconScrubError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format, args.full))?;
    println!("Created {}", output.display());
    println!("Set mixpanel_key in the file or export MIXPANEL_KEY before running.");
    Ok(())
}

const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
        (ConfigFormat::Json, false) => JSON_MINIMAL,
        (ConfigFormat::Json, true) => JSON_FULL,
        (ConfigFormat::Toml, false) => TOML_MINIMAL,
        (ConfigFormat::Toml, true) => TOML_FULL,
    }
}

const YAML_MINIMAL: &str = r#"# beacon-scrub config

# Project token injected into every event. MIXPANEL_KEY overrides it.
mixpanel_key: "your-project-token"

routes:
  - path: "/track"
    methods: ["POST"]
    target: "https://api-js.mixpanel.com/track"
  - path: "/engage"
    methods: ["POST"]
    target: "https://api-js.mixpanel.com/engage"
"#;

const YAML_FULL: &str = r#"# beacon-scrub config
#
# All values shown are defaults. Uncomment and modify as needed.

# Project token injected into every event as properties.token.
# The MIXPANEL_KEY environment variable overrides this value.
mixpanel_key: "your-project-token"

scrub:
  # realistic: example URLs for $referrer, $referring_domain, $current_url,
  #            $initial_referrer and $initial_referring_domain
  # sentinel:  one marker string for $referrer, $referring_domain, $current_url
  placeholders: realistic
  # sentinel: "CLEARED_BY_MIXPANEL_PROXY"
  # Envelope assumed when Content-Type is missing or unrecognized
  # default_encoding: form

# Global defaults applied to all routes unless overridden
defaults:
  timeout: 5000                # Upstream timeout in ms
  # forward_headers: true      # Forward client headers upstream
  # proxy_headers: true        # Add X-Forwarded-*, Via headers
  # strip_hop_by_hop: true     # Strip Connection, TE, etc.
  # headers:
  #   add: {}                  # Headers to add to all forwarded requests
  #   strip: []                # Headers to remove from all forwarded requests

routes:
  - path: "/track"
    methods: ["POST"]
    target: "https://api-js.mixpanel.com/track"

  - path: "/engage"
    methods: ["POST"]
    target: "https://api-js.mixpanel.com/engage"

  # Full: all options shown
  # - path: "/groups"
  #   methods: ["POST"]                # Default: ["*"] (all methods)
  #   scrub: true                      # Rewrite bodies on this route
  #   timeout: 10000                   # Override default for this route
  #   headers:
  #     add:
  #       X-Source: "beacon-scrub"
  #     strip: ["Cookie"]
  #   target: "https://api-js.mixpanel.com/groups"

  # Pass-through: forwarded untouched
  # - path: "/decide"
  #   scrub: false
  #   target: "https://api-js.mixpanel.com/decide"

  # Wildcard: everything else, tail of the path appended to the target
  # - path: "/*"
  #   scrub: false
  #   target: "https://api-js.mixpanel.com/:tail"
"#;

const JSON_MINIMAL: &str = r#"{
  "mixpanel_key": "your-project-token",
  "routes": [
    {
      "path": "/track",
      "methods": ["POST"],
      "target": "https://api-js.mixpanel.com/track"
    },
    {
      "path": "/engage",
      "methods": ["POST"],
      "target": "https://api-js.mixpanel.com/engage"
    }
  ]
}
"#;

const JSON_FULL: &str = r#"{
  "mixpanel_key": "your-project-token",
  "scrub": {
    "placeholders": "realistic",
    "sentinel": "CLEARED_BY_MIXPANEL_PROXY",
    "default_encoding": "form"
  },
  "defaults": {
    "timeout": 5000,
    "forward_headers": true,
    "proxy_headers": true,
    "strip_hop_by_hop": true,
    "headers": {
      "add": {},
      "strip": []
    }
  },
  "routes": [
    {
      "path": "/track",
      "methods": ["POST"],
      "target": "https://api-js.mixpanel.com/track"
    },
    {
      "path": "/engage",
      "methods": ["POST"],
      "target": "https://api-js.mixpanel.com/engage"
    },
    {
      "path": "/decide",
      "scrub": false,
      "target": "https://api-js.mixpanel.com/decide"
    }
  ]
}
"#;

const TOML_MINIMAL: &str = r#"# beacon-scrub config

# Project token injected into every event. MIXPANEL_KEY overrides it.
mixpanel_key = "your-project-token"

[[routes]]
path = "/track"
methods = ["POST"]
target = "https://api-js.mixpanel.com/track"

[[routes]]
path = "/engage"
methods = ["POST"]
target = "https://api-js.mixpanel.com/engage"
"#;

const TOML_FULL: &str = r#"# beacon-scrub config
#
# All values shown are defaults. Uncomment and modify as needed.

# Project token injected into every event as properties.token.
# The MIXPANEL_KEY environment variable overrides this value.
mixpanel_key = "your-project-token"

[scrub]
# placeholders = "realistic"   # or "sentinel"
# sentinel = "CLEARED_BY_MIXPANEL_PROXY"
# default_encoding = "form"    # or "json"

[defaults]
# timeout = 5000
# forward_headers = true
# proxy_headers = true
# strip_hop_by_hop = true

# [defaults.headers]
# add = {}
# strip = []

[[routes]]
path = "/track"
methods = ["POST"]
target = "https://api-js.mixpanel.com/track"
# scrub = true
# timeout = 5000

[[routes]]
path = "/engage"
methods = ["POST"]
target = "https://api-js.mixpanel.com/engage"

# [[routes]]
# path = "/decide"
# scrub = false
# target = "https://api-js.mixpanel.com/decide"
"#;
