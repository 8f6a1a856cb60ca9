//! Integration tests for the inference pipeline.
//!
//! These run a real `RetinaResNet` end to end on procedurally generated scans.

use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use image::{Rgb, RgbImage};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use retina::prelude::*;

type TestBackend = Autodiff<NdArray>;

/// Small variant so the tests stay fast.
fn small_config() -> RetinaResNetConfig {
    RetinaResNetConfig::default()
        .with_stem_filters(8)
        .with_filters(vec![8, 16, 16, 32])
}

/// Synthetic fundus: dark surround, warm disc, vessel-like bands, light noise.
fn synthetic_fundus(seed: u64) -> RgbImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let size = 224u32;
    let c = f64::from(size) / 2.0;
    RgbImage::from_fn(size, size, |x, y| {
        let dx = f64::from(x) + 0.5 - c;
        let dy = f64::from(y) + 0.5 - c;
        let base: [i16; 3] = if dx * dx + dy * dy > 90.0 * 90.0 {
            return Rgb([5, 5, 5]);
        } else if x % 10 < 3 {
            [40, 34, 30]
        } else {
            [140, 120, 110]
        };
        let jitter: i16 = rng.gen_range(-5..=5);
        Rgb(base.map(|v| (v + jitter).clamp(0, 255) as u8))
    })
}

fn pipeline_with(
    config: PipelineConfig,
) -> InferencePipeline<TestBackend, RetinaResNet<TestBackend>> {
    let device = Default::default();
    let model = config.model.init::<TestBackend>(&device);
    InferencePipeline::new(model, device, config).unwrap()
}

#[test]
fn test_synthetic_fundus_passes_gate() {
    let verdict = RetinalPlausibilityGate::new().evaluate(&synthetic_fundus(1));
    assert!(verdict.accepted, "rejected: {}", verdict.reason);
}

#[test]
fn test_end_to_end_with_resnet() {
    let config = PipelineConfig {
        model: small_config(),
        ..PipelineConfig::default()
    };
    let pipeline = pipeline_with(config).with_store(MemoryStore::new());
    let image = synthetic_fundus(2);

    let outcome = pipeline
        .process(&image, None, &RequestMetadata::new())
        .unwrap();
    assert_eq!(outcome.stage(), RequestStage::Completed);

    let prediction = outcome.prediction().unwrap();
    assert_eq!(prediction.class, prediction.scores.argmax());
    assert_eq!(prediction.explained_class, prediction.class);
    assert!(prediction.confidence_percent > 0.0 && prediction.confidence_percent <= 100.0);
    assert!(!prediction.degraded);
    assert_eq!(prediction.overlay.dimensions(), image.dimensions());
    assert_eq!(prediction.source, image);

    let total: f32 = prediction.probabilities.iter().sum();
    assert!((total - 1.0).abs() < 1e-4);
    assert!(prediction.image_url.as_deref().unwrap().starts_with("memory://"));
}

#[test]
fn test_requests_do_not_share_state() {
    let config = PipelineConfig {
        model: small_config(),
        ..PipelineConfig::default()
    };
    let pipeline = pipeline_with(config);
    let image = synthetic_fundus(3);

    let first = pipeline.classify_and_explain(&image, None).unwrap();
    let _other = pipeline
        .classify_and_explain(&synthetic_fundus(4), Some(RetinalClass::Cnv))
        .unwrap();
    let again = pipeline.classify_and_explain(&image, None).unwrap();

    assert_eq!(first.scores, again.scores);
    assert_eq!(first.overlay, again.overlay);
}

#[test]
fn test_noise_is_rejected_with_samples() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let noise = RgbImage::from_fn(256, 256, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]));
    let config = PipelineConfig {
        model: small_config(),
        ..PipelineConfig::default()
    }
    .with_sample_images(vec!["/assets/sample-retina.jpg".to_string()]);

    let outcome = pipeline_with(config)
        .process(&noise, None, &RequestMetadata::new())
        .unwrap();
    let rejection = outcome.rejection().unwrap();
    assert!(!rejection.verdict.accepted);
    assert!(rejection.verdict.failed_check.is_some());
    assert_eq!(rejection.sample_images, vec!["/assets/sample-retina.jpg"]);
}

#[test]
fn test_checkpoint_round_trip_preserves_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("retina");
    let device = Default::default();

    let model_config = small_config();
    let model = model_config.init::<TestBackend>(&device);
    save_checkpoint(&model, &model_config, &base).unwrap();
    let (loaded, loaded_config) = load_checkpoint::<TestBackend>(&base, &device).unwrap();
    assert_eq!(loaded_config, model_config);

    let config = PipelineConfig {
        model: model_config,
        ..PipelineConfig::default()
    };
    let image = synthetic_fundus(5);
    let original = InferencePipeline::<TestBackend, _>::new(model, device.clone(), config.clone())
        .unwrap()
        .classify_and_explain(&image, None)
        .unwrap();
    let restored = InferencePipeline::<TestBackend, _>::new(loaded, device, config)
        .unwrap()
        .classify_and_explain(&image, None)
        .unwrap();

    for (a, b) in original
        .scores
        .values()
        .iter()
        .zip(restored.scores.values().iter())
    {
        assert!((a - b).abs() < 1e-5, "{a} vs {b}");
    }
    assert_eq!(original.class, restored.class);
}

#[test]
fn test_process_bytes_round_trip() {
    let mut encoded = std::io::Cursor::new(Vec::new());
    synthetic_fundus(6)
        .write_to(&mut encoded, image::ImageFormat::Png)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = LocalDirStore::new(dir.path(), "/static/uploads").unwrap();
    let config = PipelineConfig {
        model: small_config(),
        ..PipelineConfig::default()
    };
    let metadata = RequestMetadata::new()
        .with_patient_id("P-17")
        .with_doctor_id("dr-3");
    let outcome = pipeline_with(config)
        .with_store(store)
        .process_bytes(
            encoded.get_ref(),
            "visit.png",
            Some(RetinalClass::Drusen),
            &metadata,
        )
        .unwrap();

    let prediction = outcome.prediction().unwrap();
    assert_eq!(prediction.explained_class, RetinalClass::Drusen);
    let heatmap_url = prediction.heatmap_url.as_deref().unwrap();
    assert!(heatmap_url.starts_with("/static/uploads/P-17_"));
    assert!(heatmap_url.ends_with("_visit_heatmap.png"));

    let report = prediction.report();
    assert!(report.confidence.ends_with('%'));
    assert_eq!(report.heatmap_url.as_deref(), Some(heatmap_url));
    assert_eq!(report.patient_id.as_deref(), Some("P-17"));
    assert_eq!(report.doctor_id.as_deref(), Some("dr-3"));
}

#[test]
fn test_tensor_input_shape() {
    let device = Default::default();
    let preprocess = Preprocess::new(PreprocessConfig::default()).unwrap();
    let input: Tensor<NdArray, 4> = preprocess
        .to_tensor(&synthetic_fundus(8), &device)
        .unwrap();
    assert_eq!(input.dims(), [1, 3, 224, 224]);
    assert_eq!(small_config().tap_size(224), 7);
}
