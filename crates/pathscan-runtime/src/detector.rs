//! [`SequenceDetector`] – the per-scan pipeline.
//!
//! Each call to [`SequenceDetector::process_scan`] walks one scan through
//! the full cycle and returns to [`Stage::Idle`]:
//!
//! ```text
//! Idle → ChangeCheck → ReplaceReference | KeepReference → BuildPath → Published → Idle
//! ```
//!
//! 1. **ChangeCheck** – the [`ReferenceSet`] runs the scan through the
//!    [`ChangeDetector`] (skipped for the very first scan, which simply
//!    becomes the reference).
//! 2. **Replace / Keep** – the reference either becomes the scan or stays.
//! 3. **BuildPath** – the [`PathBuilder`] orders every reference point.
//! 4. **Published** – the sequence is swapped into the [`SnapshotStore`]
//!    and handed to the [`SequenceSink`].
//!
//! The detector is the single writer of the reference and the snapshot.
//! It takes `&mut self`, so two scans can never interleave.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pathscan_middleware::RecordingSink;
//! use pathscan_runtime::{DetectorConfig, SequenceDetector};
//! use pathscan_types::{Header, Point, PointSet};
//!
//! let sink = Arc::new(RecordingSink::new());
//! let mut detector = SequenceDetector::new(DetectorConfig::default(), sink.clone()).unwrap();
//!
//! let scan = PointSet::new(Header::default(), vec![
//!     Point::new(0.0, 0.0, 0.0),
//!     Point::new(1.0, 0.0, 0.0),
//! ]);
//! let outcome = detector.process_scan(scan);
//! assert_eq!(outcome.sequence.len(), 2);
//! assert_eq!(sink.recorded().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use pathscan_middleware::{SequenceSink, SnapshotReader, SnapshotStore};
use pathscan_perception::{ChangeDetector, PathBuilder, ReferenceSet, ReferenceUpdate};
use pathscan_types::{ConfigError, PointSet};
use tracing::{debug, info, instrument, warn};

use crate::config::DetectorConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Stage
// ─────────────────────────────────────────────────────────────────────────────

/// Position of the detector in its per-scan cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ChangeCheck,
    ReplaceReference,
    KeepReference,
    BuildPath,
    Published,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ChangeCheck => "change-check",
            Stage::ReplaceReference => "replace-reference",
            Stage::KeepReference => "keep-reference",
            Stage::BuildPath => "build-path",
            Stage::Published => "published",
        };
        f.write_str(name)
    }
}

/// Result of processing one scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// What happened to the reference scene.
    pub update: ReferenceUpdate,
    /// The ordered sequence built from the reference.
    pub sequence: Arc<PointSet>,
    /// Consumers reached by the sink, `None` when publishing failed.
    pub delivered: Option<usize>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SequenceDetector
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the reference scene and turns scans into ordered sequences.
pub struct SequenceDetector {
    config: DetectorConfig,
    change: ChangeDetector,
    builder: PathBuilder,
    reference: ReferenceSet,
    sink: Arc<dyn SequenceSink>,
    snapshot: SnapshotStore,
    stage: Stage,
    scans_processed: u64,
}

impl SequenceDetector {
    /// Build a detector from `config`, publishing to `sink`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found in `config`; no detector is
    /// created in that case.
    pub fn new(config: DetectorConfig, sink: Arc<dyn SequenceSink>) -> Result<Self, ConfigError> {
        config.validate()?;
        let change = ChangeDetector::new(
            config.voxel_resolution,
            config.change_criterion,
            config.min_points_per_voxel,
        )?;
        let builder = PathBuilder::new(config.axis, config.cluster_size)?;

        info!(
            resolution = config.voxel_resolution,
            axis = %config.axis,
            k = config.cluster_size,
            criterion = %config.change_criterion,
            "sequence detector configured"
        );

        Ok(Self {
            config,
            change,
            builder,
            reference: ReferenceSet::new(),
            sink,
            snapshot: SnapshotStore::new(),
            stage: Stage::Idle,
            scans_processed: 0,
        })
    }

    /// Run one scan through the full cycle.
    #[instrument(skip_all, fields(scan = self.scans_processed, points = scan.len()))]
    pub fn process_scan(&mut self, scan: PointSet) -> ScanOutcome {
        if self.reference.is_initialized() {
            self.enter(Stage::ChangeCheck);
        }
        let update = self.reference.update(&scan, &self.change);
        match &update {
            ReferenceUpdate::Initialized => {
                self.enter(Stage::ReplaceReference);
                info!(points = scan.len(), "reference initialized from first scan");
            }
            ReferenceUpdate::Replaced { changed_points } => {
                self.enter(Stage::ReplaceReference);
                info!(
                    changed_points,
                    points = scan.len(),
                    "significant change; reference replaced"
                );
            }
            ReferenceUpdate::Kept => {
                self.enter(Stage::KeepReference);
                debug!("no significant change; reference kept");
            }
        }

        self.enter(Stage::BuildPath);
        let sequence = Arc::new(self.builder.build(self.reference.current()));

        self.snapshot.store(Arc::clone(&sequence));
        let delivered = match self.sink.publish(Arc::clone(&sequence)) {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "ordered sequence not delivered");
                None
            }
        };
        self.enter(Stage::Published);

        self.scans_processed += 1;
        self.enter(Stage::Idle);

        ScanOutcome {
            update,
            sequence,
            delivered,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// The reference scene as it stands after the last scan.
    pub fn reference(&self) -> &ReferenceSet {
        &self.reference
    }

    /// Read handle on the most recently published sequence.
    pub fn snapshot(&self) -> SnapshotReader {
        self.snapshot.reader()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn scans_processed(&self) -> u64 {
        self.scans_processed
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }
}

impl fmt::Debug for SequenceDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceDetector")
            .field("config", &self.config)
            .field("reference_points", &self.reference.current().len())
            .field("stage", &self.stage)
            .field("scans_processed", &self.scans_processed)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
