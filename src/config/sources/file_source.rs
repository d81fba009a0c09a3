//! Async file-based config source with SHA256 change detection.
//!
//! [`FileSource`] implements [`ConfigSource`] for every supported file
//! format. It reads the file through Tokio, runs the shared
//! [`load_str`](super::load_str) pipeline, and compares content hashes
//! to detect edits for hot reload.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{load_str, sha256_hex};
use crate::config::model::Config;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::BeaconScrubError;

pub struct FileSource {
    path: PathBuf,
    format: &'static str,
}

impl FileSource {
    /// `format` is the extension understood by
    /// [`parse_config_str`](super::parse_config_str).
    #[must_use]
    pub const fn new(path: PathBuf, format: &'static str) -> Self {
        Self { path, format }
    }

    async fn read_content(&self) -> Result<String, BeaconScrubError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BeaconScrubError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                BeaconScrubError::Io(e)
            }
        })
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.format
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), BeaconScrubError> {
        let content = self.read_content().await?;
        load_str(self.format, &content, &self.path.display().to_string())
    }

    async fn has_changed(&self, current: &ConfigVersion) -> Result<bool, BeaconScrubError> {
        let content = self.read_content().await?;
        let hash = sha256_hex(content.as_bytes());
        Ok(*current != ConfigVersion::Hash(hash))
    }
}
