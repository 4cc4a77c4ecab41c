//! Region configuration loaded from TOML.
//!
//! A region file captures everything unique about one deployment area:
//! grid geometry, tier cut points, weighting policy, and clustering
//! parameters. See `regions/caba.toml` for the reference config.

use std::path::Path;

use safety_map_cluster::DbscanParams;
use safety_map_grid::GridConfig;
use safety_map_incident_models::RecencyWeights;
use safety_map_safety_models::TierThresholds;
use serde::Deserialize;

/// A complete region definition.
///
/// The grid section is required; classification policy sections fall back
/// to the published defaults when omitted.
#[derive(Debug, Deserialize)]
pub struct RegionConfig {
    /// Human-readable region name (for logs only).
    pub name: Option<String>,
    /// Bounding box and cell size.
    pub grid: GridConfig,
    /// Tier cut points.
    #[serde(default)]
    pub thresholds: TierThresholds,
    /// Recency weight policy.
    #[serde(default)]
    pub weights: RecencyWeights,
    /// Accommodation clustering parameters.
    #[serde(default)]
    pub cluster: DbscanParams,
}

impl RegionConfig {
    /// Loads and validates a region file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, is not valid TOML, or
    /// fails semantic validation (degenerate bounds, unordered thresholds,
    /// out-of-range weights).
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.grid.bounds.validate()?;
        config.thresholds.validate()?;
        config.weights.validate()?;

        if let Some(name) = &config.name {
            log::info!("Loaded region '{name}' from {}", path.display());
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_region_file() {
        let toml = r#"
name = "Ciudad Autonoma de Buenos Aires"

[grid]
xmin = -58.6
ymin = -34.7
xmax = -58.3
ymax = -34.5
cell_size = 0.005

[thresholds]
safe = 250.0
moderate = 500.0
risky = 2500.0

[weights]
reference_year = 2023
steps = [1.0, 0.75, 0.5]
floor = 0.15

[cluster]
eps = 0.001
min_points = 5
"#;
        let config: RegionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.name.as_deref(), Some("Ciudad Autonoma de Buenos Aires"));
        assert!((config.grid.cell_size - 0.005).abs() < f64::EPSILON);
        assert!(config.grid.bounds.validate().is_ok());
        assert_eq!(config.weights.reference_year, 2023);
        assert_eq!(config.cluster.min_points, 5);
    }

    #[test]
    fn policy_sections_are_optional() {
        let toml = r#"
[grid]
xmin = 0.0
ymin = 0.0
xmax = 1.0
ymax = 1.0
cell_size = 0.1
"#;
        let config: RegionConfig = toml::from_str(toml).unwrap();
        assert!((config.thresholds.safe - 250.0).abs() < f64::EPSILON);
        assert!((config.weights.floor - 0.15).abs() < f64::EPSILON);
        assert!((config.cluster.eps - 0.001).abs() < f64::EPSILON);
    }
}
