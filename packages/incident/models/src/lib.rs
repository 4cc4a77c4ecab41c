#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Crime incident and accommodation record types, plus the recency
//! weighting policy applied to incidents before aggregation.
//!
//! An incident's weight is never stored: it is a pure function of the
//! incident year, so the same dataset aggregated twice always produces
//! the same densities.

use serde::{Deserialize, Serialize};

/// A single crime occurrence: a point location plus the year it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Latitude in degrees (WGS84).
    pub latitude: f64,
    /// Longitude in degrees (WGS84).
    pub longitude: f64,
    /// Calendar year of occurrence.
    pub year: i32,
    /// Source-provided incident type (e.g. "Robo", "Hurto"), if present.
    pub kind: Option<String>,
}

/// A tourist accommodation to be classified against the density surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accommodation {
    /// Establishment name, if present in the source data.
    pub name: Option<String>,
    /// Street address, if present in the source data.
    pub address: Option<String>,
    /// Latitude in degrees (WGS84).
    pub latitude: f64,
    /// Longitude in degrees (WGS84).
    pub longitude: f64,
}

/// Piecewise-constant recency decay anchored at a reference year.
///
/// The reference year gets `steps[0]`, the year before it `steps[1]`, and
/// so on; any year outside the step window (older, a gap year, or in the
/// future) collapses to `floor`. The stepped decay keeps recent crime a
/// stronger signal than older crime while staying monotonic in recency,
/// without committing to a continuous decay curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecencyWeights {
    /// Most recent observed year in the dataset; receives `steps[0]`.
    #[serde(default = "default_reference_year")]
    pub reference_year: i32,
    /// Weights for the reference year and the years immediately before it.
    #[serde(default = "default_steps")]
    pub steps: Vec<f64>,
    /// Weight for every year outside the step window.
    #[serde(default = "default_floor")]
    pub floor: f64,
}

const fn default_reference_year() -> i32 {
    2023
}

fn default_steps() -> Vec<f64> {
    vec![1.0, 0.75, 0.50]
}

const fn default_floor() -> f64 {
    0.15
}

impl Default for RecencyWeights {
    fn default() -> Self {
        Self {
            reference_year: default_reference_year(),
            steps: default_steps(),
            floor: default_floor(),
        }
    }
}

impl RecencyWeights {
    /// Returns the weight for an incident year.
    ///
    /// Total over all `i32` years; years outside the expected domain fall
    /// into the floor weight rather than erroring.
    #[must_use]
    pub fn weight_for(&self, year: i32) -> f64 {
        let delta = i64::from(self.reference_year) - i64::from(year);
        usize::try_from(delta)
            .ok()
            .and_then(|d| self.steps.get(d).copied())
            .unwrap_or(self.floor)
    }

    /// Checks that every weight is in `(0, 1]` and that the steps are
    /// strictly decreasing down to the floor.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWeightsError`] describing the first violation.
    pub fn validate(&self) -> Result<(), InvalidWeightsError> {
        for &weight in self.steps.iter().chain(std::iter::once(&self.floor)) {
            if !weight.is_finite() || weight <= 0.0 || weight > 1.0 {
                return Err(InvalidWeightsError::OutOfRange { weight });
            }
        }
        let decreasing = self
            .steps
            .windows(2)
            .all(|pair| pair[0] > pair[1])
            && self.steps.last().is_none_or(|&last| last > self.floor);
        if decreasing {
            Ok(())
        } else {
            Err(InvalidWeightsError::NotDecreasing)
        }
    }
}

/// Error returned when a [`RecencyWeights`] configuration is unusable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidWeightsError {
    /// A weight is non-finite or outside `(0, 1]`.
    OutOfRange {
        /// The offending weight.
        weight: f64,
    },
    /// Step weights are not strictly decreasing toward the floor.
    NotDecreasing,
}

impl std::fmt::Display for InvalidWeightsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { weight } => {
                write!(f, "weight {weight} is outside the valid range (0, 1]")
            }
            Self::NotDecreasing => {
                write!(f, "step weights must strictly decrease toward the floor")
            }
        }
    }
}

impl std::error::Error for InvalidWeightsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_match_published_policy() {
        let weights = RecencyWeights::default();
        assert!((weights.weight_for(2023) - 1.0).abs() < f64::EPSILON);
        assert!((weights.weight_for(2022) - 0.75).abs() < f64::EPSILON);
        assert!((weights.weight_for(2021) - 0.50).abs() < f64::EPSILON);
        assert!((weights.weight_for(2019) - 0.15).abs() < f64::EPSILON);
    }

    #[test]
    fn weights_monotonic_in_recency() {
        let weights = RecencyWeights::default();
        for year in 1900..=2023 {
            assert!(weights.weight_for(year) >= weights.weight_for(year - 1));
        }
    }

    #[test]
    fn gap_and_future_years_fall_to_floor() {
        let weights = RecencyWeights::default();
        assert!((weights.weight_for(2020) - 0.15).abs() < f64::EPSILON);
        assert!((weights.weight_for(2024) - 0.15).abs() < f64::EPSILON);
        assert!((weights.weight_for(i32::MIN) - 0.15).abs() < f64::EPSILON);
        assert!((weights.weight_for(i32::MAX) - 0.15).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_accepts_default_policy() {
        assert!(RecencyWeights::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_weight() {
        let weights = RecencyWeights {
            steps: vec![1.5, 0.75],
            ..RecencyWeights::default()
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_decreasing_steps() {
        let weights = RecencyWeights {
            steps: vec![0.5, 0.75],
            ..RecencyWeights::default()
        };
        assert!(weights.validate().is_err());
    }
}
