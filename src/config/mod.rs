//! Configuration loading, validation, and hot-reloading.
//!
//! Defines the [`ConfigSource`] trait for config backends, the
//! [`ConfigResolver`] that owns the active source (with an optional
//! fallback file), and the [`ConfigVersion`] enum for change detection.
//! Submodules provide the data model, validation logic, and the
//! file-based source implementations.

pub mod model;
pub mod sources;
pub mod validation;

use async_trait::async_trait;

use crate::error::BeaconScrubError;
use model::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}

impl ConfigVersion {
    /// Abbreviated form for logs and the health endpoint.
    #[must_use]
    pub fn short(&self) -> &str {
        match self {
            Self::Hash(h) => h.get(..8).unwrap_or(h),
        }
    }
}

// async_trait is required here because ConfigSource is used as Box<dyn ConfigSource>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn load(&self) -> Result<(Config, ConfigVersion), BeaconScrubError>;
    async fn has_changed(&self, current: &ConfigVersion) -> Result<bool, BeaconScrubError>;
}

pub struct ConfigResolver {
    primary: Box<dyn ConfigSource>,
    fallback: Option<Box<dyn ConfigSource>>,
}

impl ConfigResolver {
    #[must_use]
    pub fn new(primary: Box<dyn ConfigSource>, fallback: Option<Box<dyn ConfigSource>>) -> Self {
        Self { primary, fallback }
    }

    pub async fn load_with_fallback(&self) -> Result<(Config, ConfigVersion), BeaconScrubError> {
        match self.primary.load().await {
            Ok(result) => Ok(result),
            Err(primary_err) => {
                let Some(ref fallback) = self.fallback else {
                    return Err(primary_err);
                };
                tracing::warn!(
                    primary = self.primary.name(),
                    fallback = fallback.name(),
                    error = %primary_err,
                    "primary config source failed, using fallback"
                );
                fallback.load().await
            }
        }
    }

    /// Load a new snapshot only when the primary source reports a change.
    pub async fn reload_if_changed(
        &self,
        current: &ConfigVersion,
    ) -> Result<Option<(Config, ConfigVersion)>, BeaconScrubError> {
        if !self.primary.has_changed(current).await? {
            return Ok(None);
        }
        self.load_with_fallback().await.map(Some)
    }

    #[must_use]
    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }
}
