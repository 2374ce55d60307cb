//! Severity scale and confidence values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// Ordered severity scale, lowest first.
///
/// The numeric score (1-5) matches the scale the operators already use on
/// the dashboard ("4/5").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Informational,
    Mild,
    Moderate,
    Severe,
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Severity; 5] = [
        Severity::Informational,
        Severity::Mild,
        Severity::Moderate,
        Severity::Severe,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
            Self::Critical => "critical",
        }
    }

    /// Score on the 1-5 scale.
    pub fn score(&self) -> u8 {
        match self {
            Self::Informational => 1,
            Self::Mild => 2,
            Self::Moderate => 3,
            Self::Severe => 4,
            Self::Critical => 5,
        }
    }

    /// Inverse of [`Severity::score`].
    pub fn from_score(score: i64) -> Option<Self> {
        match score {
            1 => Some(Self::Informational),
            2 => Some(Self::Mild),
            3 => Some(Self::Moderate),
            4 => Some(Self::Severe),
            5 => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownVariant;

    /// Parses a label case-insensitively. Scores are not accepted here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_ascii_lowercase();
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str() == label)
            .ok_or_else(|| UnknownVariant::new("severity", s))
    }
}

/// A confidence value guaranteed to lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const ZERO: Confidence = Confidence(0.0);
    pub const ONE: Confidence = Confidence(1.0);

    /// Returns `None` for values outside `[0, 1]` and for NaN.
    pub fn new(value: f64) -> Option<Self> {
        if (0.0..=1.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Confidence::new(value).ok_or_else(|| format!("confidence {} outside [0, 1]", value))
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Informational < Severity::Mild);
        assert!(Severity::Moderate < Severity::Severe);
        assert!(Severity::Severe < Severity::Critical);
        assert_eq!(Severity::ALL.iter().max(), Some(&Severity::Critical));
    }

    #[test]
    fn test_severity_labels() {
        assert_eq!("severe".parse::<Severity>().unwrap(), Severity::Severe);
        assert_eq!(" CRITICAL ".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("catastrophic".parse::<Severity>().is_err());
        assert!("4".parse::<Severity>().is_err());
    }

    #[test]
    fn test_severity_scores() {
        for sev in Severity::ALL {
            assert_eq!(Severity::from_score(sev.score() as i64), Some(sev));
        }
        assert_eq!(Severity::from_score(0), None);
        assert_eq!(Severity::from_score(6), None);
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(Confidence::new(0.0).is_some());
        assert!(Confidence::new(1.0).is_some());
        assert!(Confidence::new(1.01).is_none());
        assert!(Confidence::new(-0.01).is_none());
        assert!(Confidence::new(f64::NAN).is_none());
    }

    #[test]
    fn test_confidence_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Confidence>("0.91").is_ok());
        assert!(serde_json::from_str::<Confidence>("1.5").is_err());
    }
}
