//! Greedy nearest-neighbour path through a point set.
//!
//! [`PathBuilder`] turns an unordered scan into a visiting order.  It seeds
//! the walk at the point with the largest coordinate along the configured
//! [`Axis`] and then repeatedly asks a [`NeighborSet`] for the `K` points
//! nearest to the current search point:
//!
//! - the farthest of those hits becomes the next search point,
//! - the others are emitted, closest first, and removed from the tree.
//!
//! The search point is itself live in the tree, so it comes back first from
//! its own query (distance 0) and is emitted as soon as `K ≥ 2`.  With
//! `K = 1` the only hit is the search point itself; the builder then emits
//! it and hops to its nearest remaining neighbour, which keeps the walk
//! moving.  When a single point remains it is emitted and the walk ends.
//!
//! Points with a NaN or infinite coordinate have no place in the walk; they
//! are appended after it in index order.  Every input point is emitted
//! exactly once, whatever the input.
//!
//! # Example
//!
//! ```rust
//! use pathscan_perception::path::PathBuilder;
//! use pathscan_types::{Axis, Point};
//!
//! let builder = PathBuilder::new(Axis::X, 2).unwrap();
//! let pts = [
//!     Point::new(0.0, 0.0, 0.0),
//!     Point::new(1.0, 0.0, 0.0),
//!     Point::new(2.0, 0.0, 0.0),
//! ];
//! assert_eq!(builder.build_order(&pts), vec![2, 1, 0]);
//! ```

use pathscan_types::{Axis, ConfigError, Point, PointSet, Rgb};
use tracing::{debug, instrument, warn};

use crate::neighbors::NeighborSet;

/// Builds ordered output sequences from point sets.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    axis: Axis,
    cluster_size: usize,
}

impl PathBuilder {
    /// Create a builder seeding on `axis` and pulling `cluster_size`
    /// neighbours per step.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroClusterSize`] when `cluster_size` is 0.
    pub fn new(axis: Axis, cluster_size: usize) -> Result<Self, ConfigError> {
        if cluster_size == 0 {
            return Err(ConfigError::ZeroClusterSize);
        }
        Ok(Self { axis, cluster_size })
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    /// Build the ordered, color-ramped sequence for `set`.
    ///
    /// The result carries `set`'s header and is a permutation of its points.
    #[instrument(
        level = "debug",
        skip_all,
        fields(points = set.len(), axis = %self.axis, k = self.cluster_size)
    )]
    pub fn build(&self, set: &PointSet) -> PointSet {
        let order = self.build_order(&set.points);
        let n = order.len();
        let points = order
            .into_iter()
            .enumerate()
            .map(|(visit, idx)| set.points[idx].with_color(visit_color(visit, n)))
            .collect();
        set.with_points(points)
    }

    /// Visiting order of `points` as indices into the slice.
    pub fn build_order(&self, points: &[Point]) -> Vec<usize> {
        let Some(mut search) = find_search_point(points, self.axis) else {
            if !points.is_empty() {
                debug!(points = points.len(), "no finite point to seed the walk");
            }
            return (0..points.len()).collect();
        };

        let mut set = NeighborSet::build(points);
        let mut order = Vec::with_capacity(points.len());

        while set.len() > 1 {
            let wanted = self.cluster_size.min(set.len());
            let hits = set.nearest(&points[search], wanted, Some(search));

            match hits.split_last() {
                Some((next, emitted)) if !emitted.is_empty() => {
                    for hit in emitted {
                        order.push(hit.index);
                        set.remove(hit.index);
                    }
                    search = next.index;
                }
                Some(_) => {
                    // K = 1: the query only returned the search point.
                    order.push(search);
                    set.remove(search);
                    match set.nearest(&points[search], 1, None).first() {
                        Some(hop) => search = hop.index,
                        None => break,
                    }
                }
                None => break,
            }
        }

        if set.remove(search) {
            order.push(search);
        }
        if !set.is_empty() {
            warn!(left = set.len(), "path walk ended early; appending leftovers");
            order.extend(set.live_indices());
        }
        let before = order.len();
        order.extend(set.unindexed());
        if order.len() > before {
            debug!(non_finite = order.len() - before, "non-finite points appended");
        }

        debug!(emitted = order.len(), "path built");
        order
    }
}

/// Index of the finite point with the largest coordinate along `axis`.
///
/// Uses a strict `>` so the earliest of several equal maxima wins.  Points
/// with a NaN or infinite coordinate are skipped.  `None` when no point is
/// finite.
pub fn find_search_point(points: &[Point], axis: Axis) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, p) in points.iter().enumerate().filter(|(_, p)| p.is_finite()) {
        let v = p.coord(axis);
        if best.is_none_or(|(_, best_value)| v > best_value) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Visualisation color of the `visit`-th of `total` emitted points.
///
/// A linear ramp on the red channel, `floor(256 · visit / total)`.
pub fn visit_color(visit: usize, total: usize) -> Rgb {
    if total == 0 {
        return Rgb::default();
    }
    let r = (256.0 * (visit as f64 / total as f64)) as u8;
    Rgb::new(r, 0, 0)
}
