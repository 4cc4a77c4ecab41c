#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Output generation for the density surface and classified accommodations.
//!
//! Exports the aggregated grid as a GeoJSON `FeatureCollection` (one
//! polygon feature per cell, carrying `cellId` and `density`) for map
//! rendering collaborators, and writes the per-accommodation safety
//! classification as CSV with the published Spanish column names.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use safety_map_grid::DensitySurface;
use safety_map_incident_models::Accommodation;
use safety_map_safety_models::TierThresholds;
use serde::Serialize;

/// Errors from output generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// I/O error creating or writing a file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Density surface GeoJSON ──────────────────────────────────────────────

/// Builds the GeoJSON feature collection for an aggregated surface.
///
/// Every cell is emitted, including zero-density ones, so the collection
/// always tiles the full region.
#[must_use]
pub fn surface_features(surface: &DensitySurface) -> FeatureCollection {
    let features = surface
        .cells()
        .iter()
        .map(|cell| {
            let geometry = Geometry::new(geojson::Value::from(&surface.cell_polygon(cell)));

            let mut properties = JsonObject::new();
            properties.insert("cellId".to_string(), serde_json::Value::from(cell.id));
            properties.insert("density".to_string(), serde_json::Value::from(cell.density));

            Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Writes the surface as a GeoJSON file.
///
/// # Errors
///
/// Returns [`GenerateError`] if the file cannot be written or the
/// collection fails to serialize.
pub fn export_surface_geojson(surface: &DensitySurface, path: &Path) -> Result<(), GenerateError> {
    let collection = surface_features(surface);

    let file = File::create(path).map_err(|source| GenerateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush().map_err(|source| GenerateError::Io {
        path: path.display().to_string(),
        source,
    })?;

    log::info!(
        "Exported {} cell features to {}",
        collection.features.len(),
        path.display()
    );
    Ok(())
}

// ── Classified accommodations ────────────────────────────────────────────

/// One accommodation with its safety classification, shaped for the
/// published CSV (Spanish column names, Spanish tier labels).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedAccommodation {
    /// Establishment name.
    #[serde(rename = "nombre")]
    pub name: Option<String>,
    /// Street address.
    #[serde(rename = "direccion")]
    pub address: Option<String>,
    /// Latitude in degrees.
    #[serde(rename = "latitud")]
    pub latitude: f64,
    /// Longitude in degrees.
    #[serde(rename = "longitud")]
    pub longitude: f64,
    /// Weighted crime density of the containing cell.
    #[serde(rename = "densidad")]
    pub density: f64,
    /// Safety tier label (e.g. "Muy Seguro").
    #[serde(rename = "seguridad")]
    pub tier: String,
    /// DBSCAN cluster id, -1 for noise.
    #[serde(rename = "cluster")]
    pub cluster: i32,
}

/// Classifies accommodations against the surface and drops those whose
/// density does not exceed `min_density`.
///
/// The minimum filters out accommodations in cells with essentially no
/// recorded crime, where a "very safe" label would reflect missing data
/// rather than safety. `clusters` pairs with `accommodations` by index;
/// pass an empty slice to label everything as noise.
#[must_use]
pub fn classify_accommodations(
    surface: &DensitySurface,
    thresholds: &TierThresholds,
    accommodations: &[Accommodation],
    clusters: &[i32],
    min_density: f64,
) -> Vec<ClassifiedAccommodation> {
    let rows: Vec<ClassifiedAccommodation> = accommodations
        .iter()
        .enumerate()
        .filter_map(|(index, accommodation)| {
            let assessment = surface.classify_point(
                thresholds,
                accommodation.longitude,
                accommodation.latitude,
            );
            if assessment.density <= min_density {
                return None;
            }
            Some(ClassifiedAccommodation {
                name: accommodation.name.clone(),
                address: accommodation.address.clone(),
                latitude: accommodation.latitude,
                longitude: accommodation.longitude,
                density: assessment.density,
                tier: assessment.tier.spanish_label().to_owned(),
                cluster: clusters.get(index).copied().unwrap_or(-1),
            })
        })
        .collect();

    log::info!(
        "Classified {} of {} accommodations (density > {min_density})",
        rows.len(),
        accommodations.len()
    );

    rows
}

/// Writes classified accommodations as CSV to any writer.
///
/// # Errors
///
/// Returns [`GenerateError`] if serialization fails.
pub fn write_classified_csv(
    writer: impl Write,
    rows: &[ClassifiedAccommodation],
) -> Result<(), GenerateError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes classified accommodations as a CSV file.
///
/// # Errors
///
/// Returns [`GenerateError`] if the file cannot be written.
pub fn export_classified_csv(
    path: &Path,
    rows: &[ClassifiedAccommodation],
) -> Result<(), GenerateError> {
    let file = File::create(path).map_err(|source| GenerateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    write_classified_csv(BufWriter::new(file), rows)?;
    log::info!("Exported {} classified accommodations to {}", rows.len(), path.display());
    Ok(())
}
