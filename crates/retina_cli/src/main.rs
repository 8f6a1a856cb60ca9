//! retina CLI for retinal scan validation, classification, and explanation.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use retina_core::RetinalClass;
use retina_gate::RetinalPlausibilityGate;
use retina_models::{checkpoint_exists, load_checkpoint, save_checkpoint, RetinaResNet};
use retina_pipeline::{
    InferencePipeline, LocalDirStore, PipelineConfig, PipelineOutcome, Prediction, Rejection,
    RequestMetadata,
};

/// Backend for inference; autodiff is needed for the Grad-CAM backward pass.
type InferBackend = Autodiff<NdArray>;

#[derive(Parser)]
#[command(name = "retina")]
#[command(author, version)]
#[command(about = "Retinal scan classification with Grad-CAM explanations")]
#[command(long_about = "retina: classify retinal scans as CNV, DME, DRUSEN or NORMAL and
render a Grad-CAM heatmap over the scan.

EXAMPLES:
  # Create seeded initial weights
  retina init-model --output ./models/retina

  # Check whether an image looks like a retinal scan
  retina validate scan.jpg

  # Classify and write source + heatmap images
  retina predict scan.jpg --checkpoint ./models/retina --output-dir ./out

  # Explain a specific class instead of the prediction
  retina predict scan.jpg --checkpoint ./models/retina --target DME --json")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, classify and explain a scan
    Predict(PredictArgs),
    /// Run only the retinal plausibility gate
    Validate {
        /// Input image
        image: PathBuf,

        /// Print the verdict as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Write a checkpoint with seeded initial weights
    InitModel {
        /// Checkpoint base path (without extension)
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Pipeline config JSON providing the architecture
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Random seed for weight initialisation
        #[arg(long, default_value = "42", value_name = "SEED")]
        seed: u64,
    },
}

#[derive(Args)]
struct PredictArgs {
    /// Input image (PNG, JPEG, BMP, TIFF)
    image: PathBuf,

    /// Checkpoint base path (without extension)
    #[arg(long, value_name = "PATH")]
    checkpoint: Option<PathBuf>,

    /// Pipeline config JSON
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Class to explain: CNV, DME, DRUSEN, NORMAL (default: predicted class)
    #[arg(long, value_name = "CLASS")]
    target: Option<RetinalClass>,

    /// Directory to write the source and heatmap images to
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Patient identifier; prefixes stored file names
    #[arg(long, value_name = "ID")]
    patient_id: Option<String>,

    /// Requesting doctor identifier
    #[arg(long, value_name = "ID")]
    doctor_id: Option<String>,

    /// Skip the retinal plausibility gate
    #[arg(long, default_value = "false")]
    skip_validation: bool,

    /// Print the result as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Predict(args) => handle_predict(args),
        Commands::Validate { image, json } => handle_validate(&image, json),
        Commands::InitModel {
            output,
            config,
            seed,
        } => handle_init_model(&output, config.as_deref(), seed),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config '{}'", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_model(
    checkpoint: Option<&Path>,
    config: &mut PipelineConfig,
    device: &<InferBackend as Backend>::Device,
) -> Result<RetinaResNet<InferBackend>> {
    match checkpoint {
        Some(base) if checkpoint_exists(base) => {
            let (model, model_config) = load_checkpoint::<InferBackend>(base, device)
                .with_context(|| format!("Failed to load checkpoint '{}'", base.display()))?;
            config.model = model_config;
            Ok(model)
        }
        other => {
            match other {
                Some(base) => tracing::warn!(
                    "Checkpoint '{}' not found; using seeded initial weights (seed {})",
                    base.display(),
                    config.seed
                ),
                None => tracing::warn!(
                    "No checkpoint given; using seeded initial weights (seed {})",
                    config.seed
                ),
            }
            <InferBackend as Backend>::seed(config.seed);
            Ok(config.model.init::<InferBackend>(device))
        }
    }
}

fn handle_predict(args: PredictArgs) -> Result<()> {
    let PredictArgs {
        image: image_path,
        checkpoint,
        config,
        target,
        output_dir,
        patient_id,
        doctor_id,
        skip_validation,
        json,
    } = args;
    let metadata = RequestMetadata {
        patient_id,
        doctor_id,
    };

    let device = Default::default();
    let mut config = load_config(config.as_deref())?;
    let model = load_model(checkpoint.as_deref(), &mut config, &device)?;
    let url_prefix = config.url_prefix.clone();

    let mut pipeline = InferencePipeline::<InferBackend, _>::new(model, device, config)
        .context("Failed to build pipeline")?;
    if let Some(dir) = &output_dir {
        let store = LocalDirStore::new(dir, url_prefix)
            .with_context(|| format!("Failed to prepare output directory '{}'", dir.display()))?;
        pipeline = pipeline.with_store(store);
    }

    let bytes = std::fs::read(&image_path)
        .with_context(|| format!("Failed to read image '{}'", image_path.display()))?;
    let name = image_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("scan");

    let outcome = if skip_validation {
        let image = pipeline.decode(&bytes)?;
        let mut prediction = pipeline.classify_and_explain(&image, target)?;
        prediction.metadata = metadata;
        if let Some(dir) = &output_dir {
            write_unstored(dir, name, &prediction)?;
        }
        PipelineOutcome::Completed(Box::new(prediction))
    } else {
        pipeline
            .process_bytes(&bytes, name, target, &metadata)
            .with_context(|| format!("Prediction failed for '{}'", image_path.display()))?
    };

    match outcome {
        PipelineOutcome::Completed(prediction) => print_prediction(&prediction, json)?,
        PipelineOutcome::Rejected(rejection) => print_rejection(&rejection, json)?,
    }
    Ok(())
}

fn write_unstored(dir: &Path, name: &str, prediction: &Prediction) -> Result<()> {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scan");
    std::fs::create_dir_all(dir)?;
    prediction
        .source
        .save(dir.join(format!("{stem}.png")))
        .context("Failed to write source image")?;
    prediction
        .overlay
        .save(dir.join(format!("{stem}_heatmap.png")))
        .context("Failed to write heatmap image")?;
    Ok(())
}

fn print_prediction(prediction: &Prediction, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&prediction.report())?);
        return Ok(());
    }

    println!("Prediction: {}", prediction.label);
    println!("Confidence: {}", prediction.confidence_label());
    println!("Explained class: {}", prediction.explained_class);
    if let Some(patient) = prediction.metadata.patient_id() {
        println!("Patient: {}", patient);
    }
    if let Some(doctor) = prediction.metadata.doctor_id() {
        println!("Doctor: {}", doctor);
    }
    println!("Time: {}", prediction.timestamp.to_rfc3339());
    println!();
    println!("Class probabilities:");
    for class in RetinalClass::ALL {
        println!(
            "  {:<8} {:>7.2}%",
            class.label(),
            prediction.probabilities[class.index()] * 100.0
        );
    }
    if prediction.degraded {
        println!();
        println!("Heatmap unavailable; a neutral placeholder was produced.");
    }
    if let Some(url) = &prediction.image_url {
        println!("Image:   {}", url);
    }
    if let Some(url) = &prediction.heatmap_url {
        println!("Heatmap: {}", url);
    }
    Ok(())
}

fn print_rejection(rejection: &Rejection, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rejection)?);
        return Ok(());
    }

    println!("Rejected: {}", rejection.verdict.reason);
    if let Some(check) = rejection.verdict.failed_check {
        println!("Failed check: {} ({}/8)", check, check.ordinal());
    }
    if !rejection.sample_images.is_empty() {
        println!();
        println!("Examples of valid retinal scans:");
        for sample in &rejection.sample_images {
            println!("  {}", sample);
        }
    }
    Ok(())
}

fn handle_validate(image_path: &Path, json: bool) -> Result<()> {
    let image = image::open(image_path)
        .with_context(|| format!("Failed to open image '{}'", image_path.display()))?
        .to_rgb8();
    let verdict = RetinalPlausibilityGate::new().evaluate(&image);

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else if verdict.accepted {
        println!("Accepted: {}", verdict.reason);
    } else {
        println!("Rejected: {}", verdict.reason);
        if let Some(check) = verdict.failed_check {
            println!("Failed check: {} ({}/8)", check, check.ordinal());
        }
    }
    Ok(())
}

fn handle_init_model(output: &Path, config_path: Option<&Path>, seed: u64) -> Result<()> {
    let config = load_config(config_path)?;
    let device = Default::default();

    <NdArray as Backend>::seed(seed);
    let model = config.model.init::<NdArray>(&device);
    save_checkpoint(&model, &config.model, output)
        .with_context(|| format!("Failed to save checkpoint '{}'", output.display()))?;

    println!("Initialised RetinaResNet with seed {}", seed);
    println!("  Filters: {:?}", config.model.n_filters);
    let input = config.preprocess.size as usize;
    println!("  Tap map: {0}x{0} at {1}px input", config.model.tap_size(input), input);
    println!("  Saved to: {}", output.display());
    Ok(())
}
