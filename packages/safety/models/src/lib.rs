#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Safety tier taxonomy and density threshold definitions.
//!
//! This crate defines the canonical four-tier safety classification used
//! across the safety-map system. Tiers are derived from weighted crime
//! density via configurable cut points, never stored as ground truth.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Safety tier for a location, from 1 (safest) to 4 (riskiest).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyTier {
    /// Level 1: Negligible weighted crime density
    VerySafe = 1,
    /// Level 2: Low weighted crime density
    Safe = 2,
    /// Level 3: Elevated weighted crime density
    Moderate = 3,
    /// Level 4: High weighted crime density
    Risky = 4,
}

impl SafetyTier {
    /// Returns the numeric risk level of this tier (1 = safest).
    #[must_use]
    pub const fn risk_level(self) -> u8 {
        self as u8
    }

    /// Creates a tier from a numeric risk level.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-4.
    pub const fn from_risk_level(value: u8) -> Result<Self, InvalidTierError> {
        match value {
            1 => Ok(Self::VerySafe),
            2 => Ok(Self::Safe),
            3 => Ok(Self::Moderate),
            4 => Ok(Self::Risky),
            _ => Err(InvalidTierError { value }),
        }
    }

    /// Returns the Spanish display label used in published datasets
    /// (e.g. "Muy Seguro" for the CABA accommodation export).
    #[must_use]
    pub const fn spanish_label(self) -> &'static str {
        match self {
            Self::VerySafe => "Muy Seguro",
            Self::Safe => "Seguro",
            Self::Moderate => "Moderado",
            Self::Risky => "Riesgoso",
        }
    }

    /// Returns all variants of this enum, ordered by increasing risk.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::VerySafe, Self::Safe, Self::Moderate, Self::Risky]
    }
}

/// Error returned when attempting to create a [`SafetyTier`] from an invalid
/// numeric risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTierError {
    /// The invalid risk level that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidTierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid risk level {}: expected 1-4", self.value)
    }
}

impl std::error::Error for InvalidTierError {}

/// Density cut points separating the four safety tiers.
///
/// Each field is the lowest density (inclusive) at which its tier begins,
/// so the intervals are half-open: `[0, safe)` is [`SafetyTier::VerySafe`],
/// `[safe, moderate)` is [`SafetyTier::Safe`], `[moderate, risky)` is
/// [`SafetyTier::Moderate`], and `[risky, inf)` is [`SafetyTier::Risky`].
/// Thresholds are configuration so regions can be recalibrated without
/// touching the classification algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierThresholds {
    /// Density at which [`SafetyTier::Safe`] begins.
    #[serde(default = "default_safe")]
    pub safe: f64,
    /// Density at which [`SafetyTier::Moderate`] begins.
    #[serde(default = "default_moderate")]
    pub moderate: f64,
    /// Density at which [`SafetyTier::Risky`] begins.
    #[serde(default = "default_risky")]
    pub risky: f64,
}

const fn default_safe() -> f64 {
    250.0
}

const fn default_moderate() -> f64 {
    500.0
}

const fn default_risky() -> f64 {
    2500.0
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            safe: default_safe(),
            moderate: default_moderate(),
            risky: default_risky(),
        }
    }
}

impl TierThresholds {
    /// Classifies a weighted density into a [`SafetyTier`].
    ///
    /// Total over `[0, inf)`: every non-negative density maps to exactly
    /// one tier, with boundaries closed on the lower bound.
    #[must_use]
    pub fn classify(&self, density: f64) -> SafetyTier {
        if density >= self.risky {
            SafetyTier::Risky
        } else if density >= self.moderate {
            SafetyTier::Moderate
        } else if density >= self.safe {
            SafetyTier::Safe
        } else {
            SafetyTier::VerySafe
        }
    }

    /// Checks that the cut points are finite, positive, and strictly
    /// increasing.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidThresholdsError`] describing the first violation.
    pub fn validate(&self) -> Result<(), InvalidThresholdsError> {
        for (name, value) in [
            ("safe", self.safe),
            ("moderate", self.moderate),
            ("risky", self.risky),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(InvalidThresholdsError::NotPositive { name, value });
            }
        }
        if self.safe >= self.moderate || self.moderate >= self.risky {
            return Err(InvalidThresholdsError::NotIncreasing {
                safe: self.safe,
                moderate: self.moderate,
                risky: self.risky,
            });
        }
        Ok(())
    }
}

/// Error returned when a [`TierThresholds`] configuration is unusable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidThresholdsError {
    /// A cut point is non-finite or not strictly positive.
    NotPositive {
        /// Name of the offending cut point.
        name: &'static str,
        /// The offending value.
        value: f64,
    },
    /// The cut points are not strictly increasing.
    NotIncreasing {
        /// The `safe` cut point.
        safe: f64,
        /// The `moderate` cut point.
        moderate: f64,
        /// The `risky` cut point.
        risky: f64,
    },
}

impl std::fmt::Display for InvalidThresholdsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive { name, value } => {
                write!(f, "threshold '{name}' must be a positive number, got {value}")
            }
            Self::NotIncreasing {
                safe,
                moderate,
                risky,
            } => write!(
                f,
                "thresholds must be strictly increasing: safe={safe}, moderate={moderate}, risky={risky}"
            ),
        }
    }
}

impl std::error::Error for InvalidThresholdsError {}

/// The result of classifying a single point: its cell's weighted density
/// and the derived tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyAssessment {
    /// Weighted crime density of the containing cell (0 outside the grid).
    pub density: f64,
    /// Tier derived from the density.
    pub tier: SafetyTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_total_and_monotonic() {
        let thresholds = TierThresholds::default();
        let mut last = SafetyTier::VerySafe;
        for density in [0.0, 1.0, 249.999, 250.0, 499.999, 500.0, 2499.9, 2500.0, 1e9] {
            let tier = thresholds.classify(density);
            assert!(tier >= last, "tier decreased at density {density}");
            last = tier;
        }
    }

    #[test]
    fn classify_boundary_values() {
        let thresholds = TierThresholds::default();
        assert_eq!(thresholds.classify(249.999), SafetyTier::VerySafe);
        assert_eq!(thresholds.classify(250.0), SafetyTier::Safe);
        assert_eq!(thresholds.classify(499.999), SafetyTier::Safe);
        assert_eq!(thresholds.classify(500.0), SafetyTier::Moderate);
        assert_eq!(thresholds.classify(2500.0), SafetyTier::Risky);
    }

    #[test]
    fn risk_level_roundtrip() {
        for v in 1..=4u8 {
            let tier = SafetyTier::from_risk_level(v).unwrap();
            assert_eq!(tier.risk_level(), v);
        }
        assert!(SafetyTier::from_risk_level(0).is_err());
        assert!(SafetyTier::from_risk_level(5).is_err());
    }

    #[test]
    fn validate_rejects_unordered_cut_points() {
        let thresholds = TierThresholds {
            safe: 500.0,
            moderate: 250.0,
            risky: 2500.0,
        };
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_cut_points() {
        let thresholds = TierThresholds {
            safe: 0.0,
            ..TierThresholds::default()
        };
        assert!(thresholds.validate().is_err());
        assert!(TierThresholds::default().validate().is_ok());
    }

    #[test]
    fn tiers_ordered_by_risk() {
        let all = SafetyTier::all();
        for pair in all.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
