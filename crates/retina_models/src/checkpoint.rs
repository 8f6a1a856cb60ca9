//! Model checkpointing and serialization utilities.
//!
//! Weights are stored with Burn's named MessagePack recorder (`*.mpk`); a JSON
//! sidecar (`*.json`) records the architecture and configuration needed to
//! rebuild the module before loading.
//!
//! # Example
//!
//! ```rust,ignore
//! use retina_models::checkpoint::{save_checkpoint, load_checkpoint};
//! use retina_models::RetinaResNetConfig;
//!
//! let config = RetinaResNetConfig::default();
//! let model = config.init::<NdArray>(&device);
//! save_checkpoint(&model, &config, "weights/retina")?;
//!
//! let (restored, config) = load_checkpoint::<NdArray>("weights/retina", &device)?;
//! ```

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use retina_core::RetinalClass;
use serde::{Deserialize, Serialize};

use crate::cnn::{RetinaResNet, RetinaResNetConfig};

/// Architecture name written into checkpoint metadata.
pub const ARCH_NAME: &str = "RetinaResNet";

/// Model checkpoint metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Model architecture name.
    pub arch: String,
    /// Configuration the weights were created with.
    pub config: RetinaResNetConfig,
    /// Class labels in score order.
    pub classes: Vec<String>,
}

impl CheckpointMetadata {
    /// Create new metadata for a RetinaResNet configuration.
    pub fn new(config: &RetinaResNetConfig) -> Self {
        Self {
            arch: ARCH_NAME.to_string(),
            config: config.clone(),
            classes: RetinalClass::ALL
                .iter()
                .map(|c| c.label().to_string())
                .collect(),
        }
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| CheckpointError::Load(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| CheckpointError::Load(e.to_string()))
    }
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// Checkpoint was written for another architecture or class table.
    #[error("Incompatible checkpoint: {0}")]
    Incompatible(String),
}

/// Path of the weights file for a checkpoint base path.
pub fn weights_path(base: impl AsRef<Path>) -> PathBuf {
    base.as_ref().with_extension("mpk")
}

/// Path of the metadata sidecar for a checkpoint base path.
pub fn metadata_path(base: impl AsRef<Path>) -> PathBuf {
    base.as_ref().with_extension("json")
}

/// Whether both checkpoint files exist for `base`.
pub fn checkpoint_exists(base: impl AsRef<Path>) -> bool {
    weights_path(&base).is_file() && metadata_path(&base).is_file()
}

/// Save model weights and metadata under `base` (extensions are replaced).
pub fn save_checkpoint<B: Backend>(
    model: &RetinaResNet<B>,
    config: &RetinaResNetConfig,
    base: impl AsRef<Path>,
) -> Result<()> {
    let base = base.as_ref();
    if let Some(parent) = base.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Save(e.to_string()))?;
        }
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(weights_path(base), &recorder)
        .map_err(|e| CheckpointError::Save(e.to_string()))?;
    CheckpointMetadata::new(config).save(metadata_path(base))?;

    tracing::info!("Saved checkpoint to {}", weights_path(base).display());
    Ok(())
}

/// Rebuild a model from the metadata sidecar and load its weights.
pub fn load_checkpoint<B: Backend>(
    base: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(RetinaResNet<B>, RetinaResNetConfig)> {
    let base = base.as_ref();
    let metadata = CheckpointMetadata::load(metadata_path(base))?;
    if metadata.arch != ARCH_NAME {
        return Err(CheckpointError::Incompatible(format!(
            "expected architecture {ARCH_NAME}, found {}",
            metadata.arch
        )));
    }
    let expected = CheckpointMetadata::new(&metadata.config).classes;
    if metadata.classes != expected {
        return Err(CheckpointError::Incompatible(format!(
            "class table {:?} does not match {:?}",
            metadata.classes, expected
        )));
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let model = metadata
        .config
        .init::<B>(device)
        .load_file(weights_path(base), &recorder, device)
        .map_err(|e| CheckpointError::Load(e.to_string()))?;

    tracing::info!("Loaded checkpoint from {}", weights_path(base).display());
    Ok((model, metadata.config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    fn tiny_config() -> RetinaResNetConfig {
        RetinaResNetConfig::default()
            .with_stem_filters(2)
            .with_filters(vec![2, 4])
    }

    #[test]
    fn test_checkpoint_metadata() {
        let meta = CheckpointMetadata::new(&tiny_config());
        assert_eq!(meta.arch, ARCH_NAME);
        assert_eq!(meta.classes, vec!["CNV", "DME", "DRUSEN", "NORMAL"]);
        assert_eq!(meta.config.n_filters, vec![2, 4]);
    }

    #[test]
    fn test_checkpoint_paths() {
        assert_eq!(weights_path("runs/model"), PathBuf::from("runs/model.mpk"));
        assert_eq!(metadata_path("runs/model.mpk"), PathBuf::from("runs/model.json"));
    }

    #[test]
    fn test_save_and_load_preserves_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("nested").join("retina");
        let device = Default::default();
        let config = tiny_config();
        let model = config.init::<NdArray>(&device);

        save_checkpoint(&model, &config, &base).unwrap();
        assert!(checkpoint_exists(&base));

        let (restored, restored_config) = load_checkpoint::<NdArray>(&base, &device).unwrap();
        assert_eq!(restored_config, config);

        let x = Tensor::<NdArray, 4>::ones([1, 3, 32, 32], &device);
        let before = model.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
        let after = restored.forward(x).into_data().to_vec::<f32>().unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_missing_checkpoint_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_checkpoint::<NdArray>(dir.path().join("absent"), &Default::default());
        assert!(matches!(result, Err(CheckpointError::Load(_))));
    }

    #[test]
    fn test_incompatible_arch() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("other");
        let mut meta = CheckpointMetadata::new(&tiny_config());
        meta.arch = "VisionTransformer".to_string();
        meta.save(metadata_path(&base)).unwrap();
        let result = load_checkpoint::<NdArray>(&base, &Default::default());
        assert!(matches!(result, Err(CheckpointError::Incompatible(_))));
    }
}
