//! Double-buffered voxel occupancy.
//!
//! Partitions 3-D space into fixed-size cubic voxels so that two scans can
//! be compared cheaply: insert the first scan, [`switch_buffers`], insert
//! the second, then ask which points of the second scan landed in voxels the
//! first one never touched.
//!
//! # Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`VoxelKey`]       | Integer grid coordinate of a voxel.              |
//! | [`VoxelOccupancy`] | Working buffer plus the previous-buffer snapshot. |
//!
//! The grid is anchored at the origin: a point `p` falls into voxel
//! `floor(p / resolution)` on each axis.
//!
//! # Example
//!
//! ```rust
//! use pathscan_perception::voxel::VoxelOccupancy;
//! use pathscan_types::Point;
//!
//! let mut grid = VoxelOccupancy::new(1.0).unwrap();
//! grid.insert_points(&[Point::new(0.5, 0.5, 0.5)]);
//! grid.switch_buffers();
//! grid.insert_points(&[Point::new(0.2, 0.2, 0.2), Point::new(4.0, 0.0, 0.0)]);
//!
//! // Only the second point sits in a voxel that was empty before the switch.
//! assert_eq!(grid.new_voxel_point_indices(0), vec![1]);
//! ```
//!
//! [`switch_buffers`]: VoxelOccupancy::switch_buffers

use std::collections::{HashMap, HashSet};

use pathscan_types::{ConfigError, Point};
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// VoxelKey
// ────────────────────────────────────────────────────────────────────────────

/// Integer coordinate of a voxel on the origin-anchored grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelKey {
    pub i: i64,
    pub j: i64,
    pub k: i64,
}

impl VoxelKey {
    pub fn new(i: i64, j: i64, k: i64) -> Self {
        Self { i, j, k }
    }

    /// Voxel containing `p` at the given `resolution`.
    ///
    /// Returns `None` for points with a non-finite coordinate.
    pub fn of(p: &Point, resolution: f32) -> Option<Self> {
        if !p.is_finite() {
            return None;
        }
        let cell = |c: f32| (f64::from(c) / f64::from(resolution)).floor() as i64;
        Some(Self::new(cell(p.x), cell(p.y), cell(p.z)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// VoxelOccupancy
// ────────────────────────────────────────────────────────────────────────────

/// Voxel occupancy with a working buffer and a snapshot of the previous one.
///
/// Construct with [`VoxelOccupancy::new`], fill with
/// [`insert_points`][Self::insert_points], freeze the occupied set with
/// [`switch_buffers`][Self::switch_buffers], insert the second point set and
/// query [`new_voxel_point_indices`][Self::new_voxel_point_indices].
#[derive(Debug, Clone)]
pub struct VoxelOccupancy {
    resolution: f32,
    /// Voxel of every point inserted into the working buffer, by insertion
    /// index.  `None` marks a skipped non-finite point.
    inserted: Vec<Option<VoxelKey>>,
    /// Number of working-buffer points per voxel.
    current: HashMap<VoxelKey, usize>,
    /// Voxels occupied when the buffers were last switched.
    previous: HashSet<VoxelKey>,
}

impl VoxelOccupancy {
    /// Create an empty occupancy grid with voxels of side `resolution`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonPositiveResolution`] for zero or negative
    /// values and [`ConfigError::NonFiniteResolution`] for NaN or infinity.
    pub fn new(resolution: f32) -> Result<Self, ConfigError> {
        validate_resolution(resolution)?;
        Ok(Self {
            resolution,
            inserted: Vec::new(),
            current: HashMap::new(),
            previous: HashSet::new(),
        })
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Insert every point of `points` into the working buffer.
    ///
    /// Point indices reported later are positions within the concatenation
    /// of all slices inserted since the last switch.  Non-finite points keep
    /// their index slot but never occupy a voxel.
    pub fn insert_points(&mut self, points: &[Point]) {
        let mut skipped = 0usize;
        self.inserted.reserve(points.len());
        for p in points {
            let key = VoxelKey::of(p, self.resolution);
            match key {
                Some(k) => *self.current.entry(k).or_insert(0) += 1,
                None => skipped += 1,
            }
            self.inserted.push(key);
        }
        if skipped > 0 {
            debug!(skipped, "non-finite points ignored by voxel grid");
        }
    }

    /// Snapshot the occupied voxels and reset the working buffer.
    ///
    /// Any earlier snapshot is discarded.
    pub fn switch_buffers(&mut self) {
        self.previous = self.current.drain().map(|(k, _)| k).collect();
        self.inserted.clear();
    }

    /// Indices of working-buffer points whose voxel is absent from the
    /// snapshot taken by the last [`switch_buffers`][Self::switch_buffers].
    ///
    /// Voxels holding `min_points_per_voxel` or fewer working points are
    /// ignored; `0` reports every point in a new voxel.  Indices come back
    /// in insertion order.
    pub fn new_voxel_point_indices(&self, min_points_per_voxel: usize) -> Vec<usize> {
        self.inserted
            .iter()
            .enumerate()
            .filter_map(|(idx, key)| {
                let key = key.as_ref()?;
                let fresh = !self.previous.contains(key)
                    && self.current.get(key).copied().unwrap_or(0) > min_points_per_voxel;
                fresh.then_some(idx)
            })
            .collect()
    }

    /// Voxels occupied by the working buffer.
    pub fn occupied_voxels(&self) -> impl Iterator<Item = &VoxelKey> {
        self.current.keys()
    }

    /// Voxels frozen by the last switch.
    pub fn previous_voxels(&self) -> impl Iterator<Item = &VoxelKey> {
        self.previous.iter()
    }

    /// Number of points inserted since the last switch, skipped ones included.
    pub fn len(&self) -> usize {
        self.inserted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
    }
}

/// Check that `resolution` can serve as a voxel side length.
pub fn validate_resolution(resolution: f32) -> Result<(), ConfigError> {
    if !resolution.is_finite() {
        return Err(ConfigError::NonFiniteResolution);
    }
    if resolution <= 0.0 {
        return Err(ConfigError::NonPositiveResolution(resolution));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
