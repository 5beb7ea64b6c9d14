//! Firmware images and their version files, keyed by model.
//!
//! For a model `ht801` the directory holds `ht801fw.bin` and `version-ht801`,
//! the latter containing a single dotted version.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use atacfg_common::version::{FirmwareVersion, VersionParseError};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} does not hold a version: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: VersionParseError,
    },
}

pub trait FirmwareAssets: Send + Sync {
    /// Directory the firmware server should expose.
    fn root(&self) -> &Path;

    /// `Ok(None)` when there is nothing to offer for `model`.
    fn latest_version(&self, model: &str) -> Result<Option<FirmwareVersion>, AssetError>;
}

#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn version_file(&self, model: &str) -> PathBuf {
        self.root.join(format!("version-{model}"))
    }

    pub fn image_file(&self, model: &str) -> PathBuf {
        self.root.join(format!("{model}fw.bin"))
    }
}

impl FirmwareAssets for DirAssets {
    fn root(&self) -> &Path {
        &self.root
    }

    fn latest_version(&self, model: &str) -> Result<Option<FirmwareVersion>, AssetError> {
        let path = self.version_file(model);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(AssetError::Io { path, source }),
        };

        let version = contents
            .trim()
            .parse()
            .map_err(|source| AssetError::Invalid { path, source })?;

        if !self.image_file(model).is_file() {
            warn!(
                "{} lists {version} but {} is missing",
                self.version_file(model).display(),
                self.image_file(model).display()
            );
            return Ok(None);
        }

        Ok(Some(version))
    }
}
