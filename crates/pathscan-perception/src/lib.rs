//! `pathscan-perception` – scan change detection and path extraction.
//!
//! Turns successive 3-D scans into a stable reference scene and an ordered
//! walk through its points.
//!
//! # Modules
//!
//! - [`voxel`] – [`VoxelOccupancy`][voxel::VoxelOccupancy]: double-buffered
//!   voxel grid answering "which of these points sit in voxels the previous
//!   set never occupied?".
//! - [`change`] – [`ChangeDetector`][change::ChangeDetector] and
//!   [`ReferenceSet`][change::ReferenceSet]: decide whether a new scan
//!   replaces the current reference scene.
//! - [`neighbors`] – [`NeighborSet`][neighbors::NeighborSet]: shrinking
//!   k-nearest-neighbour working set backed by a `kiddo` k-d tree.
//! - [`path`] – [`PathBuilder`][path::PathBuilder]: greedy clustering walk
//!   that orders every point of the reference exactly once.

pub mod change;
pub mod neighbors;
pub mod path;
pub mod voxel;

pub use change::{ChangeDetector, ChangeReport, ReferenceSet, ReferenceUpdate};
pub use neighbors::{Neighbor, NeighborSet};
pub use path::{find_search_point, visit_color, PathBuilder};
pub use voxel::{validate_resolution, VoxelKey, VoxelOccupancy};
