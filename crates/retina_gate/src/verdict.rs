//! Accept/reject verdicts.

use serde::{Deserialize, Serialize};

use crate::check::PlausibilityCheck;

/// Reason reported when evaluation itself fails.
pub const PROCESSING_ERROR_REASON: &str =
    "Image could not be analysed (processing error); please upload a different retinal scan";

/// Outcome of running the plausibility gate on one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Whether the image looks like a retinal scan.
    pub accepted: bool,
    /// Human-readable explanation.
    pub reason: String,
    /// The first check that failed, if any.
    pub failed_check: Option<PlausibilityCheck>,
}

impl ValidationVerdict {
    /// An accepting verdict.
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reason: "Image passed all retinal plausibility checks".to_string(),
            failed_check: None,
        }
    }

    /// A rejection attributed to `check`.
    pub fn reject(check: PlausibilityCheck, reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
            failed_check: Some(check),
        }
    }

    /// A rejection caused by an internal failure during evaluation.
    pub fn processing_error() -> Self {
        Self {
            accepted: false,
            reason: PROCESSING_ERROR_REASON.to_string(),
            failed_check: None,
        }
    }
}
