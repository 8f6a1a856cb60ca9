//! The inference orchestrator.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use chrono::{DateTime, Utc};
use image::RgbImage;
use retina_core::{ClassifierScores, Preprocess, RetinalClass, RetinalClassifier};
use retina_explain::{ActivationGradientTap, HeatmapSynthesizer, OverlayRenderer};
use retina_gate::{RetinalPlausibilityGate, ValidationVerdict};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::outcome::{PipelineOutcome, Prediction, Rejection, RequestMetadata, RequestStage};
use crate::store::ImageStore;

/// Gate, classify, explain and optionally store retinal scans.
///
/// The model's parameters are lazily initialised cells, so a pipeline is
/// `Send` but not `Sync`. To serve several threads, clone it once per worker:
/// clones share the image store and the stored-name counter, and every
/// request builds its own [`ActivationGradientTap`].
pub struct InferencePipeline<B: AutodiffBackend, M> {
    model: M,
    device: B::Device,
    config: PipelineConfig,
    preprocess: Preprocess,
    gate: RetinalPlausibilityGate,
    synthesizer: HeatmapSynthesizer,
    renderer: OverlayRenderer,
    store: Option<Arc<dyn ImageStore>>,
    sequence: Arc<AtomicU64>,
}

impl<B: AutodiffBackend, M: Clone> Clone for InferencePipeline<B, M> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            device: self.device.clone(),
            config: self.config.clone(),
            preprocess: self.preprocess.clone(),
            gate: self.gate,
            synthesizer: self.synthesizer,
            renderer: self.renderer.clone(),
            store: self.store.clone(),
            sequence: Arc::clone(&self.sequence),
        }
    }
}

impl<B, M> InferencePipeline<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + RetinalClassifier<B>,
    M::InnerModule: RetinalClassifier<B::InnerBackend>,
{
    /// Create a pipeline around an initialised model.
    pub fn new(model: M, device: B::Device, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let preprocess = Preprocess::new(config.preprocess.clone())
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        Ok(Self {
            model,
            device,
            config,
            preprocess,
            gate: RetinalPlausibilityGate::new(),
            synthesizer: HeatmapSynthesizer::new(),
            renderer: OverlayRenderer::new(),
            store: None,
            sequence: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Persist source and overlay images of completed requests in `store`.
    ///
    /// Pass an `Arc` to keep a handle on the store.
    #[must_use]
    pub fn with_store(mut self, store: impl ImageStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run the plausibility gate.
    pub fn validate(&self, image: &RgbImage) -> ValidationVerdict {
        self.gate.evaluate(image)
    }

    /// Classify `image` and explain `target` (the predicted class when `None`).
    ///
    /// Skips the gate. A missing gradient or a failure after the forward pass
    /// yields a degraded prediction rather than an error.
    pub fn classify_and_explain(
        &self,
        image: &RgbImage,
        target: Option<RetinalClass>,
    ) -> Result<Prediction> {
        let input = self
            .preprocess
            .to_tensor::<B::InnerBackend>(image, &self.device)
            .map_err(|e| PipelineError::failed(RequestStage::Validated, e))?;

        let mut tap = ActivationGradientTap::<B>::new();
        let logits = guard(RequestStage::Validated, || tap.forward(&self.model, input))?;
        let scores = ClassifierScores::from_tensor(logits.clone().inner())
            .map_err(|e| PipelineError::failed(RequestStage::Validated, e))?;

        let class = scores.argmax();
        let explained_class = target.unwrap_or(class);
        let confidence_percent = scores.confidence_percent(class);
        debug!(
            "Classified as {} ({:.2}%), explaining {}",
            class, confidence_percent, explained_class
        );

        let synthesized = guard(RequestStage::Classified, || {
            self.synthesizer
                .synthesize(&mut tap, logits, Some(explained_class))
        });
        let (overlay, degraded) = match synthesized {
            Ok(Ok(explanation)) => self.renderer.render_outcome(image, &explanation.outcome),
            Ok(Err(e)) => {
                warn!("Explanation failed, using placeholder overlay: {}", e);
                (OverlayRenderer::neutral(image.width(), image.height()), true)
            }
            Err(e) => {
                warn!("Explanation panicked, using placeholder overlay: {}", e);
                (OverlayRenderer::neutral(image.width(), image.height()), true)
            }
        };

        Ok(Prediction {
            class,
            label: class.label().to_string(),
            confidence_percent,
            explained_class,
            scores,
            probabilities: scores.softmax(),
            source: image.clone(),
            overlay,
            degraded,
            image_url: None,
            heatmap_url: None,
            timestamp: Utc::now(),
            metadata: RequestMetadata::default(),
        })
    }

    /// Run the full request: gate, classify, explain, store.
    pub fn process(
        &self,
        image: &RgbImage,
        target: Option<RetinalClass>,
        metadata: &RequestMetadata,
    ) -> Result<PipelineOutcome> {
        self.process_named(image, "scan", target, metadata)
    }

    /// Decode an uploaded file and [`process`](Self::process) it.
    ///
    /// `name` is the upload's file name; its stem names the stored images.
    pub fn process_bytes(
        &self,
        bytes: &[u8],
        name: &str,
        target: Option<RetinalClass>,
        metadata: &RequestMetadata,
    ) -> Result<PipelineOutcome> {
        let image = self.decode(bytes)?;
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("scan");
        self.process_named(&image, stem, target, metadata)
    }

    /// Decode uploaded bytes into an RGB image, enforcing the size limit.
    pub fn decode(&self, bytes: &[u8]) -> Result<RgbImage> {
        let limit = self.config.max_upload_bytes;
        if bytes.len() > limit {
            return Err(PipelineError::TooLarge {
                size: bytes.len(),
                limit,
            });
        }
        Ok(image::load_from_memory(bytes)?.to_rgb8())
    }

    fn process_named(
        &self,
        image: &RgbImage,
        stem: &str,
        target: Option<RetinalClass>,
        metadata: &RequestMetadata,
    ) -> Result<PipelineOutcome> {
        info!(
            "Received {}x{} image '{}' (patient: {})",
            image.width(),
            image.height(),
            stem,
            metadata.patient_id().unwrap_or("-")
        );

        let verdict = self.validate(image);
        if !verdict.accepted {
            warn!("Rejected '{}': {}", stem, verdict.reason);
            return Ok(PipelineOutcome::Rejected(Rejection {
                verdict,
                sample_images: self.config.sample_images.clone(),
            }));
        }
        debug!("'{}' passed the plausibility gate", stem);

        let mut prediction = self.classify_and_explain(image, target)?;
        prediction.metadata = metadata.clone();

        if let Some(store) = &self.store {
            let stem = self.unique_stem(stem, prediction.timestamp, metadata);
            let image_url = store.store(&format!("{stem}.png"), &prediction.source)?;
            let heatmap_url = store.store(&format!("{stem}_heatmap.png"), &prediction.overlay)?;
            prediction.image_url = Some(image_url);
            prediction.heatmap_url = Some(heatmap_url);
        }

        info!(
            "Completed '{}': {} ({}, degraded: {})",
            stem,
            prediction.label,
            prediction.confidence_label(),
            prediction.degraded
        );
        Ok(PipelineOutcome::Completed(Box::new(prediction)))
    }

    /// `[patient_]<yyyymmddHHMMSS>_<sequence>_<stem>`; unique across clones.
    fn unique_stem(
        &self,
        stem: &str,
        timestamp: DateTime<Utc>,
        metadata: &RequestMetadata,
    ) -> String {
        let time = timestamp.format("%Y%m%d%H%M%S");
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        match metadata.patient_id() {
            Some(patient) => format!("{patient}_{time}_{sequence}_{stem}"),
            None => format!("{time}_{sequence}_{stem}"),
        }
    }
}

/// Run `f`, turning a panic into a failure at `stage`.
fn guard<T>(stage: RequestStage, f: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| PipelineError::Failed {
        stage,
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
