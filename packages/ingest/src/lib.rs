#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! CSV ingestion for crime incidents and tourist accommodations.
//!
//! Reads the CABA open-data column layout (`latitud`, `longitud`, `anio`,
//! `tipo` for incidents; `nombre`, `direccion` plus coordinates for
//! accommodations), sanitizes coordinates, and yields the normalized
//! record types the density surface consumes. Malformed rows are skipped
//! and counted, never fatal: one bad row must not sink a batch of
//! hundreds of thousands.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::Datelike;
use safety_map_grid::BoundingBox;
use safety_map_incident_models::{Accommodation, Incident};
use serde::Deserialize;

/// Errors from CSV ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// I/O error opening or reading a file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV-level error (not a per-row parse failure, which is skipped).
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result of loading one CSV: the normalized records plus how many source
/// rows were dropped (malformed, unparseable, or outside the region).
#[derive(Debug, Clone)]
pub struct CsvLoad<T> {
    /// Records that survived sanitization.
    pub records: Vec<T>,
    /// Rows dropped along the way.
    pub dropped: usize,
}

// ── Incidents ────────────────────────────────────────────────────────────

/// A raw row from the consolidated crime CSV, column names as published.
#[derive(Debug, Deserialize)]
pub struct RawIncident {
    /// Latitude column (may hold junk or micro-degree values).
    #[serde(rename = "latitud", default)]
    pub latitude: Option<String>,
    /// Longitude column.
    #[serde(rename = "longitud", default)]
    pub longitude: Option<String>,
    /// Year column.
    #[serde(rename = "anio", default)]
    pub year: Option<String>,
    /// Occurrence date, used for the year when `anio` is absent.
    #[serde(rename = "fecha", default)]
    pub date: Option<String>,
    /// Incident type (e.g. "Robo").
    #[serde(rename = "tipo", default)]
    pub kind: Option<String>,
}

impl RawIncident {
    /// Converts this raw row into a normalized [`Incident`].
    ///
    /// Returns `None` if coordinates are missing, unrecoverable, or
    /// outside `bounds`, or if no year can be determined.
    #[must_use]
    pub fn to_incident(&self, bounds: &BoundingBox) -> Option<Incident> {
        let lat = parse_f64(self.latitude.as_deref())?;
        let lng = parse_f64(self.longitude.as_deref())?;
        let (latitude, longitude) = normalize_coordinates(lat, lng, bounds)?;

        let year = self
            .year
            .as_deref()
            .and_then(parse_year)
            .or_else(|| self.date.as_deref().and_then(year_from_date))?;

        Some(Incident {
            latitude,
            longitude,
            year,
            kind: self
                .kind
                .as_deref()
                .map(str::trim)
                .filter(|kind| !kind.is_empty())
                .map(str::to_owned),
        })
    }
}

/// Reads incidents from any CSV reader.
///
/// # Errors
///
/// Returns [`IngestError`] if the underlying reader fails; individual
/// malformed rows are dropped and counted instead.
pub fn read_incidents(
    reader: impl Read,
    bounds: &BoundingBox,
) -> Result<CsvLoad<Incident>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for result in csv_reader.deserialize::<RawIncident>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                log::trace!("skipping malformed incident row: {e}");
                dropped += 1;
                continue;
            }
        };

        match raw.to_incident(bounds) {
            Some(incident) => records.push(incident),
            None => dropped += 1,
        }
    }

    log::info!(
        "Loaded {} incidents ({dropped} rows dropped)",
        records.len()
    );

    Ok(CsvLoad { records, dropped })
}

/// Reads incidents from a CSV file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or read.
pub fn load_incidents(
    path: &Path,
    bounds: &BoundingBox,
) -> Result<CsvLoad<Incident>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_incidents(BufReader::new(file), bounds)
}

// ── Accommodations ───────────────────────────────────────────────────────

/// A raw row from the geocoded accommodations CSV.
#[derive(Debug, Deserialize)]
pub struct RawAccommodation {
    /// Establishment name.
    #[serde(rename = "nombre", default)]
    pub name: Option<String>,
    /// Street address.
    #[serde(rename = "direccion", default)]
    pub address: Option<String>,
    /// Latitude column.
    #[serde(rename = "latitud", default)]
    pub latitude: Option<String>,
    /// Longitude column.
    #[serde(rename = "longitud", default)]
    pub longitude: Option<String>,
}

impl RawAccommodation {
    /// Converts this raw row into a normalized [`Accommodation`].
    ///
    /// Returns `None` if coordinates are missing, unrecoverable, or
    /// outside `bounds`.
    #[must_use]
    pub fn to_accommodation(&self, bounds: &BoundingBox) -> Option<Accommodation> {
        let lat = parse_f64(self.latitude.as_deref())?;
        let lng = parse_f64(self.longitude.as_deref())?;
        let (latitude, longitude) = normalize_coordinates(lat, lng, bounds)?;

        let clean = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_owned)
        };

        Some(Accommodation {
            name: clean(&self.name),
            address: clean(&self.address),
            latitude,
            longitude,
        })
    }
}

/// Reads accommodations from any CSV reader.
///
/// # Errors
///
/// Returns [`IngestError`] if the underlying reader fails; individual
/// malformed rows are dropped and counted instead.
pub fn read_accommodations(
    reader: impl Read,
    bounds: &BoundingBox,
) -> Result<CsvLoad<Accommodation>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for result in csv_reader.deserialize::<RawAccommodation>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                log::trace!("skipping malformed accommodation row: {e}");
                dropped += 1;
                continue;
            }
        };

        match raw.to_accommodation(bounds) {
            Some(accommodation) => records.push(accommodation),
            None => dropped += 1,
        }
    }

    log::info!(
        "Loaded {} accommodations ({dropped} rows dropped)",
        records.len()
    );

    Ok(CsvLoad { records, dropped })
}

/// Reads accommodations from a CSV file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or read.
pub fn load_accommodations(
    path: &Path,
    bounds: &BoundingBox,
) -> Result<CsvLoad<Accommodation>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_accommodations(BufReader::new(file), bounds)
}

// ── Sanitization ─────────────────────────────────────────────────────────

/// Sanitizes a lat/lng pair against the region bounds.
///
/// Source files occasionally store coordinates in micro-degrees (the
/// value multiplied by 10^6); values past the valid geographic range are
/// scaled back before the bounds check. Returns `None` for non-finite,
/// zero, or still-out-of-range coordinates — upstream junk is filtered
/// here so the aggregation core never sees it.
#[must_use]
pub fn normalize_coordinates(lat: f64, lng: f64, bounds: &BoundingBox) -> Option<(f64, f64)> {
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    if lat == 0.0 || lng == 0.0 {
        return None;
    }

    let lat = if (lat < bounds.ymin || lat > bounds.ymax) && lat.abs() > 90.0 {
        lat / 1e6
    } else {
        lat
    };
    let lng = if (lng < bounds.xmin || lng > bounds.xmax) && lng.abs() > 180.0 {
        lng / 1e6
    } else {
        lng
    };

    bounds.contains(lng, lat).then_some((lat, lng))
}

/// Parses a float field, tolerating surrounding whitespace.
fn parse_f64(value: Option<&str>) -> Option<f64> {
    value?.trim().parse::<f64>().ok()
}

/// Parses a year field, tolerating float-typed columns ("2023.0").
#[allow(clippy::cast_possible_truncation)]
fn parse_year(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    if let Ok(year) = trimmed.parse::<i32>() {
        return Some(year);
    }
    let float = trimmed.parse::<f64>().ok()?;
    (float.is_finite() && float.abs() < f64::from(i32::MAX)).then(|| float as i32)
}

/// Extracts the year from a date column. Accepts ISO dates and datetimes
/// plus the `DD/MM/YYYY` layout common in Argentine exports.
fn year_from_date(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.year());
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.year());
        }
    }
    None
}
