#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! CLI entry point for the accommodation safety pipeline.
//!
//! Wires ingestion, density aggregation, clustering, and export together:
//! `surface` builds the weighted crime density grid and writes it as
//! GeoJSON, `classify` labels every accommodation with a safety tier, and
//! `point` answers an ad-hoc "how safe is this coordinate" query.

mod config;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use config::RegionConfig;
use safety_map_grid::DensitySurface;

#[derive(Parser)]
#[command(name = "safety_map", about = "Accommodation safety classification tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the weighted density surface and export it as GeoJSON
    Surface {
        /// Consolidated incidents CSV
        #[arg(long)]
        incidents: PathBuf,
        /// Region TOML file
        #[arg(long, default_value = "regions/caba.toml")]
        region: PathBuf,
        /// Output GeoJSON path
        #[arg(long, default_value = "data/generated/grid_density.geojson")]
        output: PathBuf,
    },
    /// Classify accommodations against the density surface
    Classify {
        /// Consolidated incidents CSV
        #[arg(long)]
        incidents: PathBuf,
        /// Geocoded accommodations CSV
        #[arg(long)]
        accommodations: PathBuf,
        /// Region TOML file
        #[arg(long, default_value = "regions/caba.toml")]
        region: PathBuf,
        /// Output CSV path
        #[arg(long, default_value = "data/generated/accommodations_classified.csv")]
        output: PathBuf,
        /// Drop accommodations whose cell density does not exceed this
        #[arg(long, default_value_t = 1.0)]
        min_density: f64,
    },
    /// Look up density and safety tier for a single coordinate
    Point {
        /// Latitude in degrees
        #[arg(long)]
        lat: f64,
        /// Longitude in degrees
        #[arg(long)]
        lon: f64,
        /// Consolidated incidents CSV
        #[arg(long)]
        incidents: PathBuf,
        /// Region TOML file
        #[arg(long, default_value = "regions/caba.toml")]
        region: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Surface {
            incidents,
            region,
            output,
        } => {
            let region = RegionConfig::load(&region)?;
            let surface = build_surface(&region, &incidents)?;
            ensure_parent_dir(&output)?;
            safety_map_generate::export_surface_geojson(&surface, &output)?;
        }
        Commands::Classify {
            incidents,
            accommodations,
            region,
            output,
            min_density,
        } => {
            let region = RegionConfig::load(&region)?;
            let surface = build_surface(&region, &incidents)?;

            let load =
                safety_map_ingest::load_accommodations(&accommodations, &region.grid.bounds)?;

            let positions: Vec<[f64; 2]> = load
                .records
                .iter()
                .map(|accommodation| [accommodation.longitude, accommodation.latitude])
                .collect();
            let clusters = safety_map_cluster::cluster_points(&positions, &region.cluster);

            let rows = safety_map_generate::classify_accommodations(
                &surface,
                &region.thresholds,
                &load.records,
                &clusters,
                min_density,
            );

            ensure_parent_dir(&output)?;
            safety_map_generate::export_classified_csv(&output, &rows)?;
        }
        Commands::Point {
            lat,
            lon,
            incidents,
            region,
        } => {
            let region = RegionConfig::load(&region)?;
            let surface = build_surface(&region, &incidents)?;

            let assessment = surface.classify_point(&region.thresholds, lon, lat);
            println!("density: {:.2}", assessment.density);
            println!(
                "tier: {} ({})",
                assessment.tier,
                assessment.tier.spanish_label()
            );
        }
    }

    Ok(())
}

/// Builds and aggregates the density surface for a region.
fn build_surface(
    region: &RegionConfig,
    incidents_path: &Path,
) -> Result<DensitySurface, Box<dyn std::error::Error>> {
    let mut surface = DensitySurface::build(&region.grid)?;

    let load = safety_map_ingest::load_incidents(incidents_path, &region.grid.bounds)?;
    let summary = surface.aggregate(&region.weights, &load.records);

    log::info!(
        "Surface ready: {} incidents aggregated, {} dropped during ingest, {} dropped outside grid",
        summary.retained,
        load.dropped,
        summary.dropped
    );

    Ok(surface)
}

/// Creates the parent directory of an output path if it is missing.
fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
