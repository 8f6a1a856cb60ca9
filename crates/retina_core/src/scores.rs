//! Per-class classifier scores.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::class::{RetinalClass, NUM_CLASSES};
use crate::error::{CoreError, Result};

/// Raw classifier output: one logit per diagnostic class, in class-table order.
///
/// # Example
///
/// ```rust
/// use retina_core::{ClassifierScores, RetinalClass};
///
/// let scores = ClassifierScores::new([0.1, 0.2, 0.05, 4.0]);
/// assert_eq!(scores.argmax(), RetinalClass::Normal);
/// assert!(scores.confidence_percent(RetinalClass::Normal) > 90.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierScores {
    values: [f32; NUM_CLASSES],
}

impl ClassifierScores {
    /// Wrap a fixed-size score array.
    #[must_use]
    pub const fn new(values: [f32; NUM_CLASSES]) -> Self {
        Self { values }
    }

    /// Build scores from a slice, which must hold exactly one value per class.
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        let values: [f32; NUM_CLASSES] =
            values.try_into().map_err(|_| CoreError::InvalidShape {
                expected: format!("{NUM_CLASSES} class scores"),
                got: format!("{} values", values.len()),
            })?;
        Ok(Self::new(values))
    }

    /// Read scores back from a `(1, n_classes)` logits tensor.
    pub fn from_tensor<B: Backend>(logits: Tensor<B, 2>) -> Result<Self> {
        let [batch, classes] = logits.dims();
        if batch != 1 || classes != NUM_CLASSES {
            return Err(CoreError::InvalidShape {
                expected: format!("[1, {NUM_CLASSES}]"),
                got: format!("[{batch}, {classes}]"),
            });
        }
        let values = logits
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| CoreError::TensorData(format!("{e:?}")))?;
        Self::from_slice(&values)
    }

    /// The raw logits.
    #[must_use]
    pub const fn values(&self) -> &[f32; NUM_CLASSES] {
        &self.values
    }

    /// Score of one class.
    #[must_use]
    pub const fn score(&self, class: RetinalClass) -> f32 {
        self.values[class.index()]
    }

    /// Class with the highest score. Ties resolve to the lowest index.
    #[must_use]
    pub fn argmax(&self) -> RetinalClass {
        let mut best = 0;
        for (i, &value) in self.values.iter().enumerate().skip(1) {
            if value > self.values[best] {
                best = i;
            }
        }
        RetinalClass::ALL[best]
    }

    /// Softmax-normalised probabilities.
    #[must_use]
    pub fn softmax(&self) -> [f32; NUM_CLASSES] {
        let max = self
            .values
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        let mut probs = [0.0f32; NUM_CLASSES];
        let mut total = 0.0f32;
        for (p, &v) in probs.iter_mut().zip(self.values.iter()) {
            *p = (v - max).exp();
            total += *p;
        }
        for p in &mut probs {
            *p /= total;
        }
        probs
    }

    /// Probability of `class` expressed as a percentage.
    #[must_use]
    pub fn confidence_percent(&self, class: RetinalClass) -> f32 {
        self.softmax()[class.index()] * 100.0
    }

    /// One-hot gradient seed selecting `class`.
    #[must_use]
    pub fn one_hot(class: RetinalClass) -> [f32; NUM_CLASSES] {
        let mut seed = [0.0f32; NUM_CLASSES];
        seed[class.index()] = 1.0;
        seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    #[test]
    fn test_argmax_matches_max_score() {
        let cases = [
            ([4.0, 0.2, 0.1, 0.0], RetinalClass::Cnv),
            ([0.0, 3.0, 0.1, -1.0], RetinalClass::Dme),
            ([-2.0, -3.0, -0.5, -1.0], RetinalClass::Drusen),
            ([0.1, 0.2, 0.05, 4.0], RetinalClass::Normal),
        ];
        for (values, expected) in cases {
            assert_eq!(ClassifierScores::new(values).argmax(), expected);
        }
    }

    #[test]
    fn test_argmax_ties_pick_first() {
        let scores = ClassifierScores::new([1.0, 1.0, 1.0, 1.0]);
        assert_eq!(scores.argmax(), RetinalClass::Cnv);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let scores = ClassifierScores::new([0.1, 0.2, 0.05, 4.0]);
        let probs = scores.softmax();
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(probs.iter().all(|&p| p > 0.0 && p <= 1.0));
    }

    #[test]
    fn test_confidence_percent() {
        let scores = ClassifierScores::new([0.1, 0.2, 0.05, 4.0]);
        let confidence = scores.confidence_percent(scores.argmax());
        // exp(4) / (exp(0.1) + exp(0.2) + exp(0.05) + exp(4))
        assert!((confidence - 94.17).abs() < 0.05, "got {confidence}");
        assert!(confidence > 0.0 && confidence <= 100.0);
    }

    #[test]
    fn test_confidence_large_logits_stays_finite() {
        let scores = ClassifierScores::new([1000.0, 0.0, 0.0, 0.0]);
        let confidence = scores.confidence_percent(RetinalClass::Cnv);
        assert!(confidence.is_finite());
        assert!((confidence - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_one_hot() {
        assert_eq!(
            ClassifierScores::one_hot(RetinalClass::Drusen),
            [0.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(ClassifierScores::from_slice(&[1.0, 2.0, 3.0]).is_err());
        assert!(ClassifierScores::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_err());
        assert!(ClassifierScores::from_slice(&[1.0, 2.0, 3.0, 4.0]).is_ok());
    }

    #[test]
    fn test_from_tensor() {
        let device = Default::default();
        let logits = Tensor::<NdArray, 2>::from_data(
            TensorData::new(vec![0.5f32, 1.5, -0.5, 0.0], [1, 4]),
            &device,
        );
        let scores = ClassifierScores::from_tensor(logits).unwrap();
        assert_eq!(scores.values(), &[0.5, 1.5, -0.5, 0.0]);
        assert_eq!(scores.argmax(), RetinalClass::Dme);

        let wrong = Tensor::<NdArray, 2>::zeros([2, 4], &device);
        assert!(ClassifierScores::from_tensor(wrong).is_err());
    }
}
