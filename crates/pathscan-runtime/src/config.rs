//! Startup configuration of the sequence detector.

use pathscan_perception::validate_resolution;
use pathscan_types::{Axis, ChangeCriterion, ConfigError};
use serde::{Deserialize, Serialize};

/// Voxel side length used when none is configured.
pub const DEFAULT_VOXEL_RESOLUTION: f32 = 64.0;
/// Neighbours pulled per step of the path walk.
pub const DEFAULT_CLUSTER_SIZE: usize = 2;
/// Scans that may wait for processing before submitters are held back.
pub const DEFAULT_INGEST_QUEUE: usize = 2;

/// Configuration bundle for [`SequenceDetector`][crate::detector::SequenceDetector].
///
/// Set once at startup and immutable afterwards.  Call
/// [`validate`][Self::validate] (the detector does) before processing scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Side length of the change-detection voxels, in scan units.
    pub voxel_resolution: f32,
    /// Axis whose maximum seeds the path walk.
    pub axis: Axis,
    /// Cluster size K of the path walk.
    pub cluster_size: usize,
    /// Which voxel difference replaces the reference scene.
    pub change_criterion: ChangeCriterion,
    /// New voxels with this many points or fewer are ignored as noise.
    pub min_points_per_voxel: usize,
    /// Depth of the scan ingestion queue of [`ScanService`][crate::service::ScanService].
    pub ingest_queue: usize,
    /// Channel capacity of the sequence broadcast bus.
    pub publish_capacity: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            voxel_resolution: DEFAULT_VOXEL_RESOLUTION,
            axis: Axis::X,
            cluster_size: DEFAULT_CLUSTER_SIZE,
            change_criterion: ChangeCriterion::VacatedVoxels,
            min_points_per_voxel: 0,
            ingest_queue: DEFAULT_INGEST_QUEUE,
            publish_capacity: pathscan_middleware::bus::DEFAULT_CAPACITY,
        }
    }
}

impl DetectorConfig {
    /// Return the first configuration error, if any.
    ///
    /// Zero queue sizes are raised to 1 by their users rather than rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_resolution(self.voxel_resolution)?;
        if self.cluster_size == 0 {
            return Err(ConfigError::ZeroClusterSize);
        }
        Ok(())
    }
}
