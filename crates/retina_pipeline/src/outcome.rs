//! Request stages and results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use image::RgbImage;
use retina_core::{ClassifierScores, RetinalClass, NUM_CLASSES};
use retina_gate::ValidationVerdict;
use serde::{Deserialize, Serialize};

/// Lifecycle of one request.
///
/// `Received -> Validated -> Classified -> Explained -> Completed`, with
/// `Rejected` and `Failed` as early terminal stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStage {
    /// Image received, not yet validated.
    Received,
    /// Passed the plausibility gate.
    Validated,
    /// Forward pass done.
    Classified,
    /// Heatmap synthesized.
    Explained,
    /// Result packaged.
    Completed,
    /// Turned away by the gate.
    Rejected,
    /// Ended by an unexpected error.
    Failed,
}

impl RequestStage {
    /// Whether no further transitions follow.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStage::Completed | RequestStage::Rejected | RequestStage::Failed
        )
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStage::Received => "received",
            RequestStage::Validated => "validated",
            RequestStage::Classified => "classified",
            RequestStage::Explained => "explained",
            RequestStage::Completed => "completed",
            RequestStage::Rejected => "rejected",
            RequestStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Caller-supplied identifiers attached to a request.
///
/// Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Patient the scan belongs to; prefixes stored file names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    /// Requesting doctor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
}

impl RequestMetadata {
    /// Metadata with no identifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the patient identifier.
    #[must_use]
    pub fn with_patient_id(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    /// Set the doctor identifier.
    #[must_use]
    pub fn with_doctor_id(mut self, doctor_id: impl Into<String>) -> Self {
        self.doctor_id = Some(doctor_id.into());
        self
    }

    /// The patient identifier, if non-empty.
    pub fn patient_id(&self) -> Option<&str> {
        self.patient_id.as_deref().filter(|id| !id.is_empty())
    }

    /// The doctor identifier, if non-empty.
    pub fn doctor_id(&self) -> Option<&str> {
        self.doctor_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// A classified and explained scan.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Predicted class (argmax of the scores).
    pub class: RetinalClass,
    /// Label of `class`.
    pub label: String,
    /// Softmax probability of `class`, in percent.
    pub confidence_percent: f32,
    /// Class the heatmap explains.
    pub explained_class: RetinalClass,
    /// Raw logits.
    pub scores: ClassifierScores,
    /// Softmax probabilities in class order.
    pub probabilities: [f32; NUM_CLASSES],
    /// The input image.
    pub source: RgbImage,
    /// Heatmap overlay, or the neutral placeholder when degraded.
    pub overlay: RgbImage,
    /// Whether the overlay carries no attribution.
    pub degraded: bool,
    /// URL of the stored source image.
    pub image_url: Option<String>,
    /// URL of the stored overlay.
    pub heatmap_url: Option<String>,
    /// When the forward pass ran.
    pub timestamp: DateTime<Utc>,
    /// Identifiers supplied with the request.
    pub metadata: RequestMetadata,
}

impl Prediction {
    /// Confidence formatted as `"xx.xx%"`.
    pub fn confidence_label(&self) -> String {
        format!("{:.2}%", self.confidence_percent)
    }

    /// Serializable summary without pixel data.
    pub fn report(&self) -> PredictionReport {
        PredictionReport {
            success: true,
            prediction: self.label.clone(),
            confidence: self.confidence_label(),
            explained_class: self.explained_class,
            probabilities: RetinalClass::ALL
                .iter()
                .map(|class| (class.label().to_string(), self.probabilities[class.index()]))
                .collect(),
            degraded: self.degraded,
            image_url: self.image_url.clone(),
            heatmap_url: self.heatmap_url.clone(),
            timestamp: self.timestamp.to_rfc3339(),
            patient_id: self.metadata.patient_id().map(str::to_string),
            doctor_id: self.metadata.doctor_id().map(str::to_string),
        }
    }
}

/// JSON shape of a completed prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    /// Always `true`.
    pub success: bool,
    /// Predicted label.
    pub prediction: String,
    /// Confidence, e.g. `"94.17%"`.
    pub confidence: String,
    /// Class the heatmap explains.
    pub explained_class: RetinalClass,
    /// Probability per label.
    pub probabilities: BTreeMap<String, f32>,
    /// Whether the overlay is a placeholder.
    pub degraded: bool,
    /// Stored source URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Stored overlay URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap_url: Option<String>,
    /// RFC 3339 time of the prediction.
    pub timestamp: String,
    /// Patient identifier from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    /// Doctor identifier from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
}

/// An image turned away by the plausibility gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// The failing verdict.
    pub verdict: ValidationVerdict,
    /// Reference images of valid scans.
    pub sample_images: Vec<String>,
}

/// Terminal result of a request that did not fail.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Classified and explained.
    Completed(Box<Prediction>),
    /// Rejected by the gate.
    Rejected(Rejection),
}

impl PipelineOutcome {
    /// The terminal stage this outcome represents.
    pub fn stage(&self) -> RequestStage {
        match self {
            PipelineOutcome::Completed(_) => RequestStage::Completed,
            PipelineOutcome::Rejected(_) => RequestStage::Rejected,
        }
    }

    /// The prediction, if completed.
    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            PipelineOutcome::Completed(prediction) => Some(&**prediction),
            PipelineOutcome::Rejected(_) => None,
        }
    }

    /// The rejection, if rejected.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            PipelineOutcome::Completed(_) => None,
            PipelineOutcome::Rejected(rejection) => Some(rejection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_stages() {
        assert!(RequestStage::Completed.is_terminal());
        assert!(RequestStage::Rejected.is_terminal());
        assert!(RequestStage::Failed.is_terminal());
        assert!(!RequestStage::Classified.is_terminal());
        assert_eq!(RequestStage::Explained.to_string(), "explained");
    }

    fn sample_prediction(metadata: RequestMetadata) -> Prediction {
        let scores = ClassifierScores::new([0.1, 0.2, 0.05, 4.0]);
        Prediction {
            class: RetinalClass::Normal,
            label: "NORMAL".to_string(),
            confidence_percent: scores.confidence_percent(RetinalClass::Normal),
            explained_class: RetinalClass::Normal,
            scores,
            probabilities: scores.softmax(),
            source: RgbImage::new(1, 1),
            overlay: RgbImage::new(1, 1),
            degraded: false,
            image_url: None,
            heatmap_url: None,
            timestamp: DateTime::parse_from_rfc3339("2026-03-01T09:30:00+00:00")
                .unwrap()
                .with_timezone(&Utc),
            metadata,
        }
    }

    #[test]
    fn test_report_formats_confidence() {
        let report = sample_prediction(RequestMetadata::new()).report();
        assert_eq!(report.confidence, "94.17%");
        assert_eq!(report.prediction, "NORMAL");
        assert_eq!(report.probabilities.len(), 4);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("image_url").is_none());
        assert_eq!(json["explained_class"], "NORMAL");
        assert_eq!(json["timestamp"], "2026-03-01T09:30:00+00:00");
        assert!(json.get("patient_id").is_none());
        assert!(json.get("doctor_id").is_none());
    }

    #[test]
    fn test_report_carries_request_ids() {
        let metadata = RequestMetadata::new()
            .with_patient_id("P-0042")
            .with_doctor_id("dr-7");
        let json = serde_json::to_value(sample_prediction(metadata).report()).unwrap();
        assert_eq!(json["patient_id"], "P-0042");
        assert_eq!(json["doctor_id"], "dr-7");
    }

    #[test]
    fn test_empty_ids_count_as_absent() {
        let metadata = RequestMetadata::new().with_patient_id("").with_doctor_id("dr-7");
        assert_eq!(metadata.patient_id(), None);
        let report = sample_prediction(metadata).report();
        assert_eq!(report.patient_id, None);
        assert_eq!(report.doctor_id.as_deref(), Some("dr-7"));
    }
}
