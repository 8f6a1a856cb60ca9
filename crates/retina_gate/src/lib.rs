//! # retina_gate
//!
//! Heuristic gate deciding whether an image plausibly is a retinal fundus
//! scan before it reaches the classifier.
//!
//! Eight checks run in a fixed order and evaluation stops at the first
//! failure:
//!
//! 1. resolution of at least 100x100
//! 2. at least 15% dark background pixels
//! 3. at least 5% non-background pixels
//! 4. fundus-like colour balance
//! 5. one circular region covering 8% to 92% of the frame
//! 6. intensity mass in both the dark and mid-tone bands
//! 7. Canny edge density between 1% and 40%
//! 8. at most 30% strongly saturated pixels
//!
//! ```rust,ignore
//! use retina_gate::RetinalPlausibilityGate;
//!
//! let verdict = RetinalPlausibilityGate::new().evaluate(&image);
//! if !verdict.accepted {
//!     println!("{}", verdict.reason);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod check;
pub mod gate;
pub mod verdict;

pub use analysis::ImageAnalysis;
pub use check::PlausibilityCheck;
pub use gate::RetinalPlausibilityGate;
pub use verdict::{ValidationVerdict, PROCESSING_ERROR_REASON};
