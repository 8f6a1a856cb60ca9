//! The diagnostic class table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Number of diagnostic classes the classifier scores.
pub const NUM_CLASSES: usize = 4;

/// Diagnostic category of a retinal scan.
///
/// The discriminant is the index into [`crate::ClassifierScores`]:
/// `0 = CNV`, `1 = DME`, `2 = DRUSEN`, `3 = NORMAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetinalClass {
    /// Choroidal neovascularization.
    Cnv = 0,
    /// Diabetic macular edema.
    Dme = 1,
    /// Drusen deposits.
    Drusen = 2,
    /// No pathology detected.
    Normal = 3,
}

impl RetinalClass {
    /// All classes in index order.
    pub const ALL: [RetinalClass; NUM_CLASSES] = [
        RetinalClass::Cnv,
        RetinalClass::Dme,
        RetinalClass::Drusen,
        RetinalClass::Normal,
    ];

    /// Index of this class in the score vector.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a class by score index.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(CoreError::UnknownClass(index))
    }

    /// Display label, as reported to callers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            RetinalClass::Cnv => "CNV",
            RetinalClass::Dme => "DME",
            RetinalClass::Drusen => "DRUSEN",
            RetinalClass::Normal => "NORMAL",
        }
    }
}

impl fmt::Display for RetinalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RetinalClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|class| class.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::UnknownLabel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_order() {
        assert_eq!(RetinalClass::Cnv.index(), 0);
        assert_eq!(RetinalClass::Dme.index(), 1);
        assert_eq!(RetinalClass::Drusen.index(), 2);
        assert_eq!(RetinalClass::Normal.index(), 3);
        for (i, class) in RetinalClass::ALL.iter().enumerate() {
            assert_eq!(RetinalClass::from_index(i).unwrap(), *class);
        }
        assert!(RetinalClass::from_index(NUM_CLASSES).is_err());
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("drusen".parse::<RetinalClass>().unwrap(), RetinalClass::Drusen);
        assert_eq!(" NORMAL ".parse::<RetinalClass>().unwrap(), RetinalClass::Normal);
        assert!("glaucoma".parse::<RetinalClass>().is_err());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&RetinalClass::Cnv).unwrap();
        assert_eq!(json, "\"CNV\"");
        let restored: RetinalClass = serde_json::from_str("\"DME\"").unwrap();
        assert_eq!(restored, RetinalClass::Dme);
    }
}
