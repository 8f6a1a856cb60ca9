//! The retinal plausibility gate.

use std::panic::{catch_unwind, AssertUnwindSafe};

use image::RgbImage;
use tracing::{debug, warn};

use crate::analysis::ImageAnalysis;
use crate::check::PlausibilityCheck;
use crate::verdict::ValidationVerdict;

/// Runs the eight plausibility checks in order and stops at the first failure.
///
/// Stateless; one instance may be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetinalPlausibilityGate;

impl RetinalPlausibilityGate {
    /// Create a gate.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate all checks.
    ///
    /// Never fails: an internal panic during analysis becomes a rejection
    /// with the processing-error reason.
    pub fn evaluate(&self, image: &RgbImage) -> ValidationVerdict {
        self.guarded(image, |image| self.evaluate_checks(image))
    }

    /// Run `evaluate` and convert a panic into the processing-error verdict.
    pub(crate) fn guarded<F>(&self, image: &RgbImage, evaluate: F) -> ValidationVerdict
    where
        F: FnOnce(&RgbImage) -> ValidationVerdict,
    {
        match catch_unwind(AssertUnwindSafe(|| evaluate(image))) {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!(
                    width = image.width(),
                    height = image.height(),
                    "plausibility analysis panicked"
                );
                ValidationVerdict::processing_error()
            }
        }
    }

    /// Run a single check on its own.
    pub fn run_check(&self, check: PlausibilityCheck, image: &RgbImage) -> Result<(), String> {
        let analysis = ImageAnalysis::new(image);
        check.run(&analysis)
    }

    fn evaluate_checks(&self, image: &RgbImage) -> ValidationVerdict {
        let analysis = ImageAnalysis::new(image);
        for check in PlausibilityCheck::ALL {
            if let Err(reason) = check.run(&analysis) {
                debug!(check = %check, ordinal = check.ordinal(), %reason, "image rejected");
                return ValidationVerdict::reject(check, reason);
            }
            debug!(check = %check, "check passed");
        }
        ValidationVerdict::accept()
    }
}
