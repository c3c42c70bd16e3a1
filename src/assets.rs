//! Asset loading for the document and the stamp image

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use log::{debug, error};

use crate::error::{Result, StampError};

/// A static location that hands out named byte resources
pub trait AssetSource {
    /// Fetch the bytes of the asset called `name`
    fn fetch(&self, name: &str) -> Result<Vec<u8>>;
}

/// Assets read from a directory on disk
#[derive(Clone, Debug)]
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DirAssetSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(StampError::unavailable(name, "asset name must stay inside the asset directory"));
        }

        let path = self.root.join(relative);
        fs::read(&path).map_err(|e| StampError::unavailable(name, format!("{}: {e}", path.display())))
    }
}

/// Assets held in memory, keyed by name
#[derive(Clone, Debug, Default)]
pub struct MemoryAssetSource {
    assets: HashMap<String, Vec<u8>>,
}

impl MemoryAssetSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.assets.insert(name.into(), bytes);
    }
}

impl AssetSource for MemoryAssetSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        self.assets
            .get(name)
            .cloned()
            .ok_or_else(|| StampError::unavailable(name, "not found"))
    }
}

/// Names of the two assets the widget needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetNames {
    pub document: String,
    pub stamp: String,
}

impl Default for AssetNames {
    fn default() -> Self {
        Self {
            document: "document.pdf".to_string(),
            stamp: "stamp.png".to_string(),
        }
    }
}

/// The fetched document and stamp bytes
#[derive(Clone)]
pub struct Assets {
    pub document: Vec<u8>,
    pub stamp: Vec<u8>,
}

impl std::fmt::Debug for Assets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assets")
            .field("document_len", &self.document.len())
            .field("stamp_len", &self.stamp.len())
            .finish()
    }
}

/// Fetch both assets; either failing fails the whole load.
pub fn load_assets(source: &dyn AssetSource, names: &AssetNames) -> Result<Assets> {
    let stamp = fetch_non_empty(source, &names.stamp)?;
    let document = fetch_non_empty(source, &names.document)?;
    debug!(
        "Loaded assets: {} ({} bytes), {} ({} bytes)",
        names.document,
        document.len(),
        names.stamp,
        stamp.len()
    );
    Ok(Assets { document, stamp })
}

fn fetch_non_empty(source: &dyn AssetSource, name: &str) -> Result<Vec<u8>> {
    let bytes = source.fetch(name).inspect_err(|e| error!("Failed to fetch asset: {e}"))?;
    if bytes.is_empty() {
        error!("Asset {name} is empty");
        return Err(StampError::unavailable(name, "empty resource"));
    }
    Ok(bytes)
}
