//! Persistence strategies for source and overlay images.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;
use parking_lot::Mutex;
use thiserror::Error;

/// Errors raised by an [`ImageStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Name is empty or escapes the store.
    #[error("Invalid image name: {0}")]
    InvalidName(String),

    /// Encoding or writing the image failed.
    #[error("Failed to write {name}: {source}")]
    Write {
        /// Name under which the image was being stored.
        name: String,
        /// Underlying error.
        #[source]
        source: image::ImageError,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Pluggable persistence for pipeline images.
pub trait ImageStore: Send + Sync {
    /// Persist `image` under `name` and return the URL it can be fetched from.
    fn store(&self, name: &str, image: &RgbImage) -> Result<String, StoreError>;
}

impl<S: ImageStore + ?Sized> ImageStore for Arc<S> {
    fn store(&self, name: &str, image: &RgbImage) -> Result<String, StoreError> {
        (**self).store(name, image)
    }
}

fn check_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name == ".."
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Writes images into a local directory.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    dir: PathBuf,
    url_prefix: String,
}

impl LocalDirStore {
    /// Use `dir` (created if missing); URLs are `<url_prefix>/<name>`.
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            url_prefix: url_prefix.into(),
        })
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ImageStore for LocalDirStore {
    fn store(&self, name: &str, image: &RgbImage) -> Result<String, StoreError> {
        check_name(name)?;
        let path = self.dir.join(name);
        image.save(&path).map_err(|source| StoreError::Write {
            name: name.to_string(),
            source,
        })?;
        tracing::debug!("Stored {} at {}", name, path.display());
        Ok(format!("{}/{}", self.url_prefix.trim_end_matches('/'), name))
    }
}

/// Keeps images in memory, keyed by name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    images: Mutex<BTreeMap<String, RgbImage>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the image stored under `name`.
    pub fn get(&self, name: &str) -> Option<RgbImage> {
        self.images.lock().get(name).cloned()
    }

    /// Stored names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.images.lock().keys().cloned().collect()
    }
}

impl ImageStore for MemoryStore {
    fn store(&self, name: &str, image: &RgbImage) -> Result<String, StoreError> {
        check_name(name)?;
        self.images.lock().insert(name.to_string(), image.clone());
        Ok(format!("memory://{name}"))
    }
}
