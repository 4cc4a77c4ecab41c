#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Density-based clustering (DBSCAN) over point coordinates.
//!
//! Groups accommodations that sit within walking distance of each other
//! so downstream consumers can treat a cluster as one location feature.
//! Neighborhood queries run against an R-tree, so labeling is
//! O(n log n) rather than the quadratic pairwise scan.

use rstar::{AABB, PointDistance, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

/// Label assigned to points that belong to no cluster.
pub const NOISE: i32 = -1;

/// Internal marker for points not yet visited.
const UNLABELED: i32 = -2;

/// DBSCAN parameters.
///
/// Defaults match the published accommodation clustering for CABA:
/// a 0.001 degree radius (roughly 100 m) and 5 points per cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    /// Neighborhood radius in coordinate degrees.
    #[serde(default = "default_eps")]
    pub eps: f64,
    /// Minimum neighborhood size (the point itself included) for a point
    /// to seed a cluster.
    #[serde(default = "default_min_points")]
    pub min_points: usize,
}

const fn default_eps() -> f64 {
    0.001
}

const fn default_min_points() -> usize {
    5
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_points: default_min_points(),
        }
    }
}

/// A point stored in the R-tree with its input position.
struct PointEntry {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for PointEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for PointEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx.mul_add(dx, dy * dy)
    }
}

/// Labels each point with a cluster id (dense from 0) or [`NOISE`].
///
/// Labels are deterministic for a given input order: clusters are
/// numbered in the order their first core point appears. A noise label
/// may be upgraded later if the point turns out to sit on a cluster
/// border.
#[must_use]
pub fn cluster_points(positions: &[[f64; 2]], params: &DbscanParams) -> Vec<i32> {
    let entries = positions
        .iter()
        .enumerate()
        .map(|(index, &position)| PointEntry { index, position })
        .collect();
    let tree = RTree::bulk_load(entries);
    let eps_2 = params.eps * params.eps;

    let neighbors_of = |position: [f64; 2]| -> Vec<usize> {
        tree.locate_within_distance(position, eps_2)
            .map(|entry| entry.index)
            .collect()
    };

    let mut labels = vec![UNLABELED; positions.len()];
    let mut next_cluster: i32 = 0;

    for start in 0..positions.len() {
        if labels[start] != UNLABELED {
            continue;
        }

        let neighbors = neighbors_of(positions[start]);
        if neighbors.len() < params.min_points {
            labels[start] = NOISE;
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[start] = cluster;

        let mut queue = neighbors;
        while let Some(candidate) = queue.pop() {
            if labels[candidate] == NOISE {
                // Border point: reachable from a core point but not core
                // itself.
                labels[candidate] = cluster;
            }
            if labels[candidate] != UNLABELED {
                continue;
            }
            labels[candidate] = cluster;

            let reachable = neighbors_of(positions[candidate]);
            if reachable.len() >= params.min_points {
                queue.extend(reachable);
            }
        }
    }

    let clustered = labels.iter().filter(|&&label| label >= 0).count();
    log::info!(
        "DBSCAN labeled {clustered} of {} points across {next_cluster} clusters",
        positions.len()
    );

    labels
}
