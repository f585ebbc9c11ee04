use std::path::{Path, PathBuf};

use crate::core_api::{CoreError, CoreErrorCode};
use crate::document::{ConfigDocument, Identifier};

pub const DEFAULT_ASSET_DIRS: [&str; 2] = ["assets/buildingthumbs", "assets/thumbs"];
pub const THUMBNAIL_EXTENSION: &str = "jpg";

/// Maps identifiers to thumbnail paths. Only paths are produced; image bytes
/// are the renderer's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocator {
    dirs: Vec<PathBuf>,
}

impl Default for AssetLocator {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_DIRS.iter().map(PathBuf::from).collect())
    }
}

impl AssetLocator {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Every place the thumbnail may live, in search order. Empty when the
    /// entry names no image.
    pub fn candidates(
        &self,
        config: &ConfigDocument,
        identifier: &Identifier,
    ) -> Result<Vec<PathBuf>, CoreError> {
        let entry = config.get(identifier).ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::UnknownIdentifier,
                "identifier is not defined in the loaded configuration",
            )
            .with_subject(identifier.to_string())
        })?;

        let Some(img_name) = entry.img_name().filter(|name| !name.is_empty()) else {
            return Ok(Vec::new());
        };
        let file_name = format!("{img_name}.{THUMBNAIL_EXTENSION}");
        Ok(self.dirs.iter().map(|dir| dir.join(&file_name)).collect())
    }

    /// First candidate that exists on disk.
    pub fn locate(
        &self,
        config: &ConfigDocument,
        identifier: &Identifier,
    ) -> Result<Option<PathBuf>, CoreError> {
        Ok(self
            .candidates(config, identifier)?
            .into_iter()
            .find(|path| Path::is_file(path)))
    }
}
