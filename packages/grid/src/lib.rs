#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Grid-based crime density surface.
//!
//! Partitions a bounding box into uniform square cells, aggregates
//! recency-weighted incidents into per-cell densities, and resolves
//! arbitrary points back to their containing cell for classification.
//!
//! Cell containment is a closed-form index computation rather than a
//! point-in-polygon search: `col = floor((lon - xmin) / cell_size)` and
//! likewise for rows. Aggregation and query share the same function, so a
//! point aggregated into a cell always resolves to that cell when queried
//! later. Each lookup is O(1), keeping aggregation linear in the number of
//! incidents with no per-cell scan.

use geo::{Coord, Polygon, Rect};
use safety_map_incident_models::{Incident, RecencyWeights};
use safety_map_safety_models::{SafetyAssessment, TierThresholds};
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing or combining density surfaces.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The configured cell size is unusable.
    #[error("cell size must be positive and finite, got {cell_size}")]
    InvalidCellSize {
        /// The offending cell size.
        cell_size: f64,
    },

    /// The bounding box is degenerate or non-finite.
    #[error(
        "invalid bounding box: require finite xmin {xmin} < xmax {xmax} and ymin {ymin} < ymax {ymax}"
    )]
    InvalidBounds {
        /// West edge.
        xmin: f64,
        /// South edge.
        ymin: f64,
        /// East edge.
        xmax: f64,
        /// North edge.
        ymax: f64,
    },

    /// Two surfaces with different grid geometry cannot be merged.
    #[error("cannot merge surfaces with different geometry ({left} vs {right} cells)")]
    GeometryMismatch {
        /// Cell count of the left surface.
        left: usize,
        /// Cell count of the right surface.
        right: usize,
    },
}

/// Axis-aligned rectangular region in lon/lat degrees.
///
/// Planar only: no anti-meridian or polar handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// West edge (minimum longitude).
    pub xmin: f64,
    /// South edge (minimum latitude).
    pub ymin: f64,
    /// East edge (maximum longitude).
    pub xmax: f64,
    /// North edge (maximum latitude).
    pub ymax: f64,
}

impl BoundingBox {
    /// Checks that the box is finite and non-degenerate.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidBounds`] if any edge is non-finite,
    /// `xmin >= xmax`, or `ymin >= ymax`. Degenerate boxes are rejected,
    /// never silently corrected.
    pub fn validate(&self) -> Result<(), GridError> {
        let finite = [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite());
        if finite && self.xmin < self.xmax && self.ymin < self.ymax {
            Ok(())
        } else {
            Err(GridError::InvalidBounds {
                xmin: self.xmin,
                ymin: self.ymin,
                xmax: self.xmax,
                ymax: self.ymax,
            })
        }
    }

    /// Whether a point lies inside the box (edges inclusive).
    #[must_use]
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lng >= self.xmin && lng <= self.xmax && lat >= self.ymin && lat <= self.ymax
    }

    /// The box as a [`geo::Rect`].
    #[must_use]
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.xmin,
                y: self.ymin,
            },
            Coord {
                x: self.xmax,
                y: self.ymax,
            },
        )
    }
}

/// Configuration for building a [`DensitySurface`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Region the grid covers.
    #[serde(flatten)]
    pub bounds: BoundingBox,
    /// Side length of each square cell, in the same degrees as the bounds.
    pub cell_size: f64,
}

/// One square tile of the grid with its accumulated weighted density.
///
/// Geometry is derived from `(col, row)` and the owning surface's origin
/// and cell size; see [`DensitySurface::cell_rect`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    /// Dense zero-based cell id; also the cell's position in
    /// [`DensitySurface::cells`].
    pub id: usize,
    /// Zero-based column (west to east).
    pub col: usize,
    /// Zero-based row (south to north).
    pub row: usize,
    /// Accumulated recency-weighted incident count.
    pub density: f64,
}

/// Counts from one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    /// Incidents that landed in a cell.
    pub retained: u64,
    /// Incidents outside the grid, dropped without error.
    pub dropped: u64,
}

/// A regular grid of square cells over a bounding box, with per-cell
/// recency-weighted crime density.
///
/// Cells are enumerated column-major (x outer, y inner), so
/// `id = col * rows + row`; the enumeration is deterministic and stable
/// across runs for the same config, and downstream consumers may use the
/// id as a join key. The last column/row may extend past `xmax`/`ymax`
/// when the extent is not an exact multiple of `cell_size`; points in that
/// overshoot strip still belong to the last cell. Built once, mutated only
/// by [`aggregate`](Self::aggregate), then read-only: all queries take
/// `&self` and are safe to run concurrently.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DensitySurface {
    bounds: BoundingBox,
    cell_size: f64,
    cols: usize,
    rows: usize,
    cells: Vec<GridCell>,
}

impl DensitySurface {
    /// Builds the grid for a config, all densities zero.
    ///
    /// Column and row counts are `ceil(extent / cell_size)` (at least 1),
    /// which reproduces half-open origin enumeration including the case
    /// where float noise in the division yields one extra column.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if the bounds are degenerate or the cell size
    /// is not a positive finite number.
    pub fn build(config: &GridConfig) -> Result<Self, GridError> {
        config.bounds.validate()?;
        if !config.cell_size.is_finite() || config.cell_size <= 0.0 {
            return Err(GridError::InvalidCellSize {
                cell_size: config.cell_size,
            });
        }

        let bounds = config.bounds;
        let cols = axis_cells(bounds.xmax - bounds.xmin, config.cell_size);
        let rows = axis_cells(bounds.ymax - bounds.ymin, config.cell_size);

        let mut cells = Vec::with_capacity(cols * rows);
        for col in 0..cols {
            for row in 0..rows {
                cells.push(GridCell {
                    id: col * rows + row,
                    col,
                    row,
                    density: 0.0,
                });
            }
        }

        log::debug!("Built {cols}x{rows} grid ({} cells)", cells.len());

        Ok(Self {
            bounds,
            cell_size: config.cell_size,
            cols,
            rows,
            cells,
        })
    }

    /// Index of the cell containing a point, or `None` outside the grid.
    ///
    /// Half-open intervals `[origin, origin + cell_size)` on both axes, so
    /// a point exactly on a shared edge belongs to the higher-index cell
    /// and is never double-counted. This is the single containment
    /// function used by both aggregation and queries.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn cell_index(&self, lng: f64, lat: f64) -> Option<usize> {
        let col = ((lng - self.bounds.xmin) / self.cell_size).floor();
        let row = ((lat - self.bounds.ymin) / self.cell_size).floor();
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        (col < self.cols && row < self.rows).then_some(col * self.rows + row)
    }

    /// Accumulates recency-weighted incidents into the grid.
    ///
    /// Incidents outside the grid are dropped, counted, and logged, never
    /// an error. Accumulation is a commutative sum keyed by cell id, so
    /// per-cell totals are independent of incident order and partial
    /// surfaces can be combined with [`merge`](Self::merge).
    pub fn aggregate<'a, I>(&mut self, weights: &RecencyWeights, incidents: I) -> AggregateSummary
    where
        I: IntoIterator<Item = &'a Incident>,
    {
        let mut summary = AggregateSummary::default();
        for incident in incidents {
            if let Some(index) = self.cell_index(incident.longitude, incident.latitude) {
                self.cells[index].density += weights.weight_for(incident.year);
                summary.retained += 1;
            } else {
                summary.dropped += 1;
            }
        }

        if summary.dropped > 0 {
            log::warn!(
                "Dropped {} of {} incidents outside the grid",
                summary.dropped,
                summary.retained + summary.dropped
            );
        }
        log::info!(
            "Aggregated {} incidents into {}x{} grid",
            summary.retained,
            self.cols,
            self.rows
        );

        summary
    }

    /// Adds another surface's densities into this one, cell by cell.
    ///
    /// Supports sharded aggregation: split the incident batch, aggregate
    /// each shard into its own surface, then merge the partial sums.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::GeometryMismatch`] if the surfaces were built
    /// from different configs.
    pub fn merge(&mut self, other: &Self) -> Result<(), GridError> {
        let same_geometry = self.cols == other.cols
            && self.rows == other.rows
            && self.bounds == other.bounds
            && self.cell_size.to_bits() == other.cell_size.to_bits();
        if !same_geometry {
            return Err(GridError::GeometryMismatch {
                left: self.cells.len(),
                right: other.cells.len(),
            });
        }
        for (cell, partial) in self.cells.iter_mut().zip(&other.cells) {
            cell.density += partial.density;
        }
        Ok(())
    }

    /// The cell containing a point, or `None` outside the grid.
    #[must_use]
    pub fn cell_for(&self, lng: f64, lat: f64) -> Option<&GridCell> {
        self.cell_index(lng, lat).map(|index| &self.cells[index])
    }

    /// Weighted density at a point; 0 outside the grid (by contract, a
    /// point off the grid has no recorded crime, not an error).
    #[must_use]
    pub fn density_at(&self, lng: f64, lat: f64) -> f64 {
        self.cell_for(lng, lat).map_or(0.0, |cell| cell.density)
    }

    /// Density and safety tier for a point.
    #[must_use]
    pub fn classify_point(
        &self,
        thresholds: &TierThresholds,
        lng: f64,
        lat: f64,
    ) -> SafetyAssessment {
        let density = self.density_at(lng, lat);
        SafetyAssessment {
            density,
            tier: thresholds.classify(density),
        }
    }

    /// Geometry of a cell as an axis-aligned rectangle.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_rect(&self, cell: &GridCell) -> Rect<f64> {
        let x = self
            .cell_size
            .mul_add(cell.col as f64, self.bounds.xmin);
        let y = self
            .cell_size
            .mul_add(cell.row as f64, self.bounds.ymin);
        Rect::new(
            Coord { x, y },
            Coord {
                x: x + self.cell_size,
                y: y + self.cell_size,
            },
        )
    }

    /// Geometry of a cell as a closed polygon ring.
    #[must_use]
    pub fn cell_polygon(&self, cell: &GridCell) -> Polygon<f64> {
        self.cell_rect(cell).to_polygon()
    }

    /// The region this grid covers.
    #[must_use]
    pub const fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Side length of each cell in degrees.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// All cells in id order.
    #[must_use]
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }
}

/// Number of cells needed to cover an extent, matching half-open origin
/// enumeration (`origin_i = min + i * cell_size` for all origins strictly
/// below the far edge).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_cells(extent: f64, cell_size: f64) -> usize {
    let count = (extent / cell_size).ceil();
    if count >= 1.0 { count as usize } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caba_config() -> GridConfig {
        GridConfig {
            bounds: BoundingBox {
                xmin: -58.6,
                ymin: -34.7,
                xmax: -58.3,
                ymax: -34.5,
            },
            cell_size: 0.005,
        }
    }

    fn unit_config(cell_size: f64) -> GridConfig {
        GridConfig {
            bounds: BoundingBox {
                xmin: 0.0,
                ymin: 0.0,
                xmax: 1.0,
                ymax: 1.0,
            },
            cell_size,
        }
    }

    fn incident(lat: f64, lng: f64, year: i32) -> Incident {
        Incident {
            latitude: lat,
            longitude: lng,
            year,
            kind: None,
        }
    }

    #[test]
    fn builds_city_grid_with_stable_column_major_ids() {
        let surface = DensitySurface::build(&caba_config()).unwrap();
        // 0.3 / 0.005 lands a hair above 60 in f64, so the enumeration
        // emits one extra (overshooting) column and row.
        assert_eq!(surface.cols(), 61);
        assert_eq!(surface.rows(), 41);
        assert_eq!(surface.cells().len(), 61 * 41);
        for (index, cell) in surface.cells().iter().enumerate() {
            assert_eq!(cell.id, index);
            assert_eq!(cell.id, cell.col * surface.rows() + cell.row);
            assert!(cell.density.abs() < f64::EPSILON);
        }
        // Column-major: second cell is one row up, not one column over.
        assert_eq!(surface.cells()[1].col, 0);
        assert_eq!(surface.cells()[1].row, 1);
        assert_eq!(surface.cells()[41].col, 1);
        assert_eq!(surface.cells()[41].row, 0);
    }

    #[test]
    fn rejects_bad_config() {
        let mut config = caba_config();
        config.cell_size = 0.0;
        assert!(matches!(
            DensitySurface::build(&config),
            Err(GridError::InvalidCellSize { .. })
        ));

        let mut config = caba_config();
        config.cell_size = -0.005;
        assert!(DensitySurface::build(&config).is_err());

        let mut config = caba_config();
        config.bounds.xmax = config.bounds.xmin;
        assert!(matches!(
            DensitySurface::build(&config),
            Err(GridError::InvalidBounds { .. })
        ));

        let mut config = caba_config();
        config.bounds.ymin = -34.4;
        assert!(DensitySurface::build(&config).is_err());
    }

    #[test]
    fn interior_points_resolve_to_exactly_one_cell() {
        let surface = DensitySurface::build(&unit_config(0.25)).unwrap();
        assert_eq!(surface.cells().len(), 16);
        for &(lng, lat) in &[(0.1, 0.1), (0.26, 0.9), (0.5, 0.5), (0.999, 0.001)] {
            let cell = surface.cell_for(lng, lat).expect("interior point");
            let rect = surface.cell_rect(cell);
            assert!(lng >= rect.min().x && lng < rect.max().x);
            assert!(lat >= rect.min().y && lat < rect.max().y);
        }
    }

    #[test]
    fn cells_tile_the_box_without_gaps_or_overlaps() {
        let surface = DensitySurface::build(&unit_config(0.25)).unwrap();
        let cell_area: f64 = surface
            .cells()
            .iter()
            .map(|cell| {
                let rect = surface.cell_rect(cell);
                rect.width() * rect.height()
            })
            .sum();
        let bounds = surface.bounds().to_rect();
        assert!((cell_area - bounds.width() * bounds.height()).abs() < 1e-12);
    }

    #[test]
    fn boundary_points_belong_to_higher_index_cell() {
        // 0.25 is a power of two, so edge coordinates divide exactly.
        let surface = DensitySurface::build(&unit_config(0.25)).unwrap();
        let cell = surface.cell_for(0.25, 0.5).unwrap();
        assert_eq!((cell.col, cell.row), (1, 2));
        let cell = surface.cell_for(0.0, 0.0).unwrap();
        assert_eq!((cell.col, cell.row), (0, 0));
    }

    #[test]
    fn overshoot_strip_belongs_to_last_cell() {
        // 1.0 / 0.3 -> 4 cells per axis; the last spans [0.9, 1.2).
        let surface = DensitySurface::build(&unit_config(0.3)).unwrap();
        assert_eq!(surface.cols(), 4);
        let cell = surface.cell_for(1.05, 1.05).expect("overshoot strip");
        assert_eq!((cell.col, cell.row), (3, 3));
        assert!(surface.cell_for(1.25, 0.5).is_none());
    }

    #[test]
    fn aggregation_is_order_independent() {
        // Weights 1.0/0.75/0.5 are exact in binary, so per-cell sums are
        // bit-identical under any permutation.
        let weights = RecencyWeights::default();
        let mut incidents = Vec::new();
        for year in [2023, 2022, 2021] {
            for step in 0..10 {
                let offset = f64::from(step) * 0.07;
                incidents.push(incident(0.05 + offset, 0.05 + offset, year));
            }
        }

        let mut forward = DensitySurface::build(&unit_config(0.25)).unwrap();
        forward.aggregate(&weights, &incidents);

        let mut shuffled: Vec<&Incident> = incidents.iter().collect();
        shuffled.reverse();
        let mid = shuffled.len() / 2;
        shuffled.rotate_left(mid);
        let mut backward = DensitySurface::build(&unit_config(0.25)).unwrap();
        backward.aggregate(&weights, shuffled);

        for (a, b) in forward.cells().iter().zip(backward.cells()) {
            assert!((a.density - b.density).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn aggregation_and_query_agree_per_point() {
        let weights = RecencyWeights::default();
        let incidents = vec![
            incident(0.12, 0.81, 2023),
            incident(0.47, 0.33, 2022),
            incident(0.99, 0.01, 2020),
        ];
        let mut surface = DensitySurface::build(&unit_config(0.25)).unwrap();
        let summary = surface.aggregate(&weights, &incidents);
        assert_eq!(summary.retained, 3);

        for event in &incidents {
            let cell = surface.cell_for(event.longitude, event.latitude).unwrap();
            assert!(cell.density >= weights.weight_for(event.year));
        }
    }

    #[test]
    fn three_events_in_one_cell_classify_very_safe() {
        let weights = RecencyWeights::default();
        let incidents = vec![
            incident(-34.61, -58.40, 2023),
            incident(-34.61, -58.40, 2022),
            incident(-34.6099, -58.3999, 2021),
        ];
        let mut surface = DensitySurface::build(&caba_config()).unwrap();
        let summary = surface.aggregate(&weights, &incidents);
        assert_eq!(summary.retained, 3);
        assert_eq!(summary.dropped, 0);

        let assessment =
            surface.classify_point(&TierThresholds::default(), -58.40, -34.61);
        assert!((assessment.density - 2.25).abs() < f64::EPSILON);
        assert_eq!(
            assessment.tier,
            safety_map_safety_models::SafetyTier::VerySafe
        );

        // Both coordinates resolve to the same cell.
        let a = surface.cell_for(-58.40, -34.61).unwrap().id;
        let b = surface.cell_for(-58.3999, -34.6099).unwrap().id;
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_domain_event_is_dropped_silently() {
        let weights = RecencyWeights::default();
        let incidents = vec![incident(0.0, 0.0, 2023)];
        let mut surface = DensitySurface::build(&caba_config()).unwrap();
        let summary = surface.aggregate(&weights, &incidents);
        assert_eq!(summary.retained, 0);
        assert_eq!(summary.dropped, 1);
        assert!(surface.cells().iter().all(|cell| cell.density.abs() < f64::EPSILON));
        assert!(surface.density_at(0.0, 0.0).abs() < f64::EPSILON);
        assert!(surface.cell_for(0.0, 0.0).is_none());
    }

    #[test]
    fn merge_combines_partial_sums() {
        let weights = RecencyWeights::default();
        let incidents = vec![
            incident(0.1, 0.1, 2023),
            incident(0.1, 0.1, 2022),
            incident(0.6, 0.6, 2023),
            incident(0.9, 0.2, 2021),
        ];

        let mut whole = DensitySurface::build(&unit_config(0.25)).unwrap();
        whole.aggregate(&weights, &incidents);

        let mut left = DensitySurface::build(&unit_config(0.25)).unwrap();
        left.aggregate(&weights, &incidents[..2]);
        let mut right = DensitySurface::build(&unit_config(0.25)).unwrap();
        right.aggregate(&weights, &incidents[2..]);
        left.merge(&right).unwrap();

        for (a, b) in whole.cells().iter().zip(left.cells()) {
            assert!((a.density - b.density).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn merge_rejects_mismatched_geometry() {
        let mut a = DensitySurface::build(&unit_config(0.25)).unwrap();
        let b = DensitySurface::build(&unit_config(0.5)).unwrap();
        assert!(matches!(
            a.merge(&b),
            Err(GridError::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn cell_polygon_is_closed_square() {
        let surface = DensitySurface::build(&unit_config(0.25)).unwrap();
        let cell = surface.cell_for(0.3, 0.3).unwrap();
        let polygon = surface.cell_polygon(cell);
        let ring = polygon.exterior();
        assert_eq!(ring.0.len(), 5);
        assert_eq!(ring.0.first(), ring.0.last());
    }
}
