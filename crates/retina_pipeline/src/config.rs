//! Pipeline configuration.

use std::path::Path;

use retina_core::{PreprocessConfig, NUM_CLASSES};
use retina_models::RetinaResNetConfig;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Largest accepted upload, in bytes (16 MiB).
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for [`crate::InferencePipeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input preprocessing.
    pub preprocess: PreprocessConfig,
    /// Classifier architecture, used when no checkpoint is loaded.
    pub model: RetinaResNetConfig,
    /// Reference images returned alongside a rejection.
    pub sample_images: Vec<String>,
    /// Prefix for URLs returned by the local image store.
    pub url_prefix: String,
    /// Upload size limit in bytes.
    pub max_upload_bytes: usize,
    /// Seed for initial weights when no checkpoint is available.
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            model: RetinaResNetConfig::default(),
            sample_images: vec!["/assets/sample-retina.jpg".to_string()],
            url_prefix: "/static".to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rejection sample images.
    #[must_use]
    pub fn with_sample_images(mut self, sample_images: Vec<String>) -> Self {
        self.sample_images = sample_images;
        self
    }

    /// Set the store URL prefix.
    #[must_use]
    pub fn with_url_prefix(mut self, url_prefix: impl Into<String>) -> Self {
        self.url_prefix = url_prefix.into();
        self
    }

    /// Set the initialisation seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        self.preprocess
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        if self.model.n_classes != NUM_CLASSES {
            return Err(PipelineError::Config(format!(
                "model must score {NUM_CLASSES} classes, configured for {}",
                self.model.n_classes
            )));
        }
        if self.model.in_channels != 3 {
            return Err(PipelineError::Config(format!(
                "model must take RGB input, configured for {} channels",
                self.model.in_channels
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(PipelineError::Config("max_upload_bytes must be positive".to_string()));
        }
        Ok(())
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.preprocess.size, 224);
    }

    #[test]
    fn test_rejects_wrong_class_count() {
        let mut config = PipelineConfig::default();
        config.model.n_classes = 10;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let config = PipelineConfig::new()
            .with_seed(7)
            .with_url_prefix("https://cdn.example.org/scans")
            .with_sample_images(vec!["a.png".into(), "b.png".into()]);
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.seed, 7);
        assert_eq!(loaded.url_prefix, "https://cdn.example.org/scans");
        assert_eq!(loaded.sample_images.len(), 2);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"seed": 3}"#).unwrap();
        assert_eq!(config.seed, 3);
        assert_eq!(config.url_prefix, "/static");
    }
}
