//! TOML config source backed by [`FileSource`].

use std::path::PathBuf;

use super::file_source::FileSource;

#[must_use]
pub const fn new(path: PathBuf) -> FileSource {
    FileSource::new(path, "toml")
}
