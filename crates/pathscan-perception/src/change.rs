//! Scene-change detection and the reference set it guards.
//!
//! [`ChangeDetector`] compares two point sets through a
//! [`VoxelOccupancy`] grid and reports whether they differ enough to matter.
//! [`ReferenceSet`] owns the point set currently considered "the scene" and
//! replaces it only when the detector says so.
//!
//! # Criteria
//!
//! The default [`ChangeCriterion::VacatedVoxels`] inserts the incoming scan,
//! switches buffers, inserts the reference, and flags the reference points
//! that landed in voxels the incoming scan left empty.  In other words it
//! fires when part of the old scene is gone, not when something new appears.
//! [`ChangeCriterion::AddedVoxels`] runs the opposite pass and
//! [`ChangeCriterion::Either`] fires on both.
//!
//! # Example
//!
//! ```rust
//! use pathscan_perception::change::{ChangeDetector, ReferenceSet, ReferenceUpdate};
//! use pathscan_types::{ChangeCriterion, Header, Point, PointSet};
//!
//! let detector = ChangeDetector::new(1.0, ChangeCriterion::VacatedVoxels, 0).unwrap();
//! let mut reference = ReferenceSet::new();
//!
//! let first = PointSet::new(Header::default(), vec![Point::new(0.0, 0.0, 0.0)]);
//! assert_eq!(reference.update(&first, &detector), ReferenceUpdate::Initialized);
//!
//! let moved = PointSet::new(Header::default(), vec![Point::new(10.0, 10.0, 10.0)]);
//! assert!(matches!(reference.update(&moved, &detector), ReferenceUpdate::Replaced { .. }));
//! assert_eq!(reference.current(), &moved);
//! ```

use pathscan_types::{ChangeCriterion, ConfigError, PointSet};
use tracing::{debug, instrument};

use crate::voxel::VoxelOccupancy;

// ────────────────────────────────────────────────────────────────────────────
// ChangeDetector
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of one [`ChangeDetector::detect`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    /// True when at least one point landed in a voxel the other set lacked.
    pub significant: bool,
    /// Reference indices found in voxels the incoming scan does not occupy.
    pub vacated: Vec<usize>,
    /// Incoming indices found in voxels the reference does not occupy.
    pub added: Vec<usize>,
}

/// Voxel-diff change detector with a fixed resolution.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    /// Empty grid at the configured resolution; each pass works on a clone.
    empty_grid: VoxelOccupancy,
    criterion: ChangeCriterion,
    min_points_per_voxel: usize,
}

impl ChangeDetector {
    /// Create a detector.
    ///
    /// - `resolution` – voxel side length; must be positive and finite.
    /// - `criterion` – which voxel difference counts as a change.
    /// - `min_points_per_voxel` – new voxels holding this many points or
    ///   fewer are treated as noise.  `0` disables the filter.
    pub fn new(
        resolution: f32,
        criterion: ChangeCriterion,
        min_points_per_voxel: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            empty_grid: VoxelOccupancy::new(resolution)?,
            criterion,
            min_points_per_voxel,
        })
    }

    pub fn resolution(&self) -> f32 {
        self.empty_grid.resolution()
    }

    pub fn criterion(&self) -> ChangeCriterion {
        self.criterion
    }

    /// Compare `incoming` against `reference`.
    ///
    /// This is the raw voxel diff: with an empty `incoming` every reference
    /// point counts as vacated.  [`ReferenceSet::update`] filters that case.
    #[instrument(
        level = "debug",
        skip_all,
        fields(reference = reference.len(), incoming = incoming.len())
    )]
    pub fn detect(&self, reference: &PointSet, incoming: &PointSet) -> ChangeReport {
        let vacated = match self.criterion {
            ChangeCriterion::VacatedVoxels | ChangeCriterion::Either => {
                self.new_voxel_points(incoming, reference)
            }
            ChangeCriterion::AddedVoxels => Vec::new(),
        };
        let added = match self.criterion {
            ChangeCriterion::AddedVoxels | ChangeCriterion::Either => {
                self.new_voxel_points(reference, incoming)
            }
            ChangeCriterion::VacatedVoxels => Vec::new(),
        };
        let significant = !vacated.is_empty() || !added.is_empty();
        debug!(
            vacated = vacated.len(),
            added = added.len(),
            significant,
            "voxel diff computed"
        );
        ChangeReport {
            significant,
            vacated,
            added,
        }
    }

    /// Indices of `candidate` points in voxels that `base` does not occupy.
    fn new_voxel_points(&self, base: &PointSet, candidate: &PointSet) -> Vec<usize> {
        let mut grid = self.empty_grid.clone();
        grid.insert_points(&base.points);
        grid.switch_buffers();
        grid.insert_points(&candidate.points);
        grid.new_voxel_point_indices(self.min_points_per_voxel)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ReferenceSet
// ────────────────────────────────────────────────────────────────────────────

/// What [`ReferenceSet::update`] did with an incoming scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceUpdate {
    /// First scan ever seen; stored without running the detector.
    Initialized,
    /// The detector reported a significant change and the reference was
    /// replaced by the incoming scan.
    Replaced { changed_points: usize },
    /// The reference was left untouched.
    Kept,
}

impl ReferenceUpdate {
    /// True when the reference now holds the incoming scan.
    pub fn took_incoming(&self) -> bool {
        !matches!(self, ReferenceUpdate::Kept)
    }
}

/// The point set currently considered the scene.
///
/// Owned by exactly one writer; every update goes through
/// [`update`][Self::update].
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    current: PointSet,
    initialized: bool,
}

impl ReferenceSet {
    /// An empty, uninitialized reference.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &PointSet {
        &self.current
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Feed one incoming scan through the replacement policy.
    ///
    /// 1. The first scan initializes the reference unconditionally.
    /// 2. An empty incoming scan never replaces anything.
    /// 3. An empty reference is replaced by any non-empty scan.
    /// 4. Otherwise `detector` decides.
    pub fn update(&mut self, incoming: &PointSet, detector: &ChangeDetector) -> ReferenceUpdate {
        if !self.initialized {
            self.current = incoming.clone();
            self.initialized = true;
            return ReferenceUpdate::Initialized;
        }
        if incoming.is_empty() {
            debug!("empty incoming scan; keeping reference");
            return ReferenceUpdate::Kept;
        }
        if self.current.is_empty() {
            self.current = incoming.clone();
            return ReferenceUpdate::Replaced {
                changed_points: incoming.len(),
            };
        }

        let report = detector.detect(&self.current, incoming);
        if report.significant {
            self.current = incoming.clone();
            ReferenceUpdate::Replaced {
                changed_points: report.vacated.len() + report.added.len(),
            }
        } else {
            ReferenceUpdate::Kept
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pathscan_types::{Header, Point};

    fn set(points: &[(f32, f32, f32)]) -> PointSet {
        PointSet::new(
            Header::default(),
            points.iter().map(|&(x, y, z)| Point::new(x, y, z)).collect(),
        )
    }

    fn detector(criterion: ChangeCriterion) -> ChangeDetector {
        ChangeDetector::new(1.0, criterion, 0).unwrap()
    }

    fn seeded(points: &[(f32, f32, f32)]) -> ReferenceSet {
        let mut reference = ReferenceSet::new();
        reference.update(&set(points), &detector(ChangeCriterion::VacatedVoxels));
        reference
    }

    // ── ChangeDetector ──────────────────────────────────────────────────────

    #[test]
    fn invalid_resolution_is_rejected_at_setup() {
        assert!(ChangeDetector::new(0.0, ChangeCriterion::VacatedVoxels, 0).is_err());
        assert!(ChangeDetector::new(-1.0, ChangeCriterion::Either, 0).is_err());
        assert!(ChangeDetector::new(f32::INFINITY, ChangeCriterion::AddedVoxels, 0).is_err());
    }

    #[test]
    fn identical_sets_are_not_a_change() {
        let a = set(&[(0.0, 0.0, 0.0), (2.0, 3.0, 4.0)]);
        for criterion in [
            ChangeCriterion::VacatedVoxels,
            ChangeCriterion::AddedVoxels,
            ChangeCriterion::Either,
        ] {
            assert!(!detector(criterion).detect(&a, &a).significant);
        }
    }

    #[test]
    fn disjoint_voxels_are_a_change() {
        let reference = set(&[(0.0, 0.0, 0.0)]);
        let incoming = set(&[(10.0, 10.0, 10.0)]);
        let report = detector(ChangeCriterion::VacatedVoxels).detect(&reference, &incoming);
        assert!(report.significant);
        assert_eq!(report.vacated, vec![0]);
        assert!(report.added.is_empty());
    }

    #[test]
    fn vacated_criterion_ignores_added_points() {
        // Incoming is a superset of the reference: nothing was vacated.
        let reference = set(&[(0.0, 0.0, 0.0)]);
        let incoming = set(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0)]);
        assert!(!detector(ChangeCriterion::VacatedVoxels)
            .detect(&reference, &incoming)
            .significant);
    }

    #[test]
    fn added_criterion_flags_added_points() {
        let reference = set(&[(0.0, 0.0, 0.0)]);
        let incoming = set(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0)]);
        let report = detector(ChangeCriterion::AddedVoxels).detect(&reference, &incoming);
        assert!(report.significant);
        assert_eq!(report.added, vec![1]);
    }

    #[test]
    fn either_criterion_flags_both_directions() {
        let reference = set(&[(0.0, 0.0, 0.0), (5.0, 0.0, 0.0)]);
        let incoming = set(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0)]);
        let report = detector(ChangeCriterion::Either).detect(&reference, &incoming);
        assert_eq!(report.vacated, vec![1]);
        assert_eq!(report.added, vec![1]);
    }

    #[test]
    fn raw_detect_with_empty_incoming_flags_every_reference_point() {
        let reference = set(&[(0.0, 0.0, 0.0), (3.0, 0.0, 0.0)]);
        let report = detector(ChangeCriterion::VacatedVoxels).detect(&reference, &set(&[]));
        assert_eq!(report.vacated, vec![0, 1]);
    }

    #[test]
    fn repeated_detection_starts_from_an_empty_grid() {
        let d = detector(ChangeCriterion::Either);
        let reference = set(&[(0.0, 0.0, 0.0), (5.0, 0.0, 0.0)]);
        let incoming = set(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0)]);

        let first = d.detect(&reference, &incoming);
        assert!(first.significant);
        for _ in 0..3 {
            assert_eq!(d.detect(&reference, &incoming), first);
        }
        // Occupancy from earlier passes must not mask a real change.
        assert!(!d.detect(&incoming, &incoming).significant);
        assert_eq!(d.detect(&reference, &incoming), first);
        assert_eq!(d.clone().detect(&reference, &incoming), first);
        assert_eq!(d.resolution(), 1.0);
    }

    #[test]
    fn coarse_resolution_hides_small_moves() {
        let coarse = ChangeDetector::new(64.0, ChangeCriterion::VacatedVoxels, 0).unwrap();
        let reference = set(&[(0.0, 0.0, 0.0)]);
        let incoming = set(&[(10.0, 10.0, 10.0)]);
        assert!(!coarse.detect(&reference, &incoming).significant);
    }

    // ── ReferenceSet ────────────────────────────────────────────────────────

    #[test]
    fn first_scan_initializes_reference() {
        let mut reference = ReferenceSet::new();
        assert!(!reference.is_initialized());
        let scan = set(&[(1.0, 1.0, 1.0)]);
        let update = reference.update(&scan, &detector(ChangeCriterion::VacatedVoxels));
        assert_eq!(update, ReferenceUpdate::Initialized);
        assert!(reference.is_initialized());
        assert_eq!(reference.current(), &scan);
    }

    #[test]
    fn identical_scan_keeps_reference() {
        let mut reference = seeded(&[(0.0, 0.0, 0.0)]);
        let update = reference.update(
            &set(&[(0.0, 0.0, 0.0)]),
            &detector(ChangeCriterion::VacatedVoxels),
        );
        assert_eq!(update, ReferenceUpdate::Kept);
        assert_eq!(reference.current(), &set(&[(0.0, 0.0, 0.0)]));
    }

    #[test]
    fn moved_scene_replaces_reference() {
        let mut reference = seeded(&[(0.0, 0.0, 0.0)]);
        let incoming = set(&[(10.0, 10.0, 10.0)]);
        let update = reference.update(&incoming, &detector(ChangeCriterion::VacatedVoxels));
        assert_eq!(update, ReferenceUpdate::Replaced { changed_points: 1 });
        assert_eq!(reference.current(), &incoming);
    }

    #[test]
    fn empty_incoming_scan_keeps_reference() {
        let mut reference = seeded(&[(0.0, 0.0, 0.0)]);
        let update = reference.update(&set(&[]), &detector(ChangeCriterion::VacatedVoxels));
        assert_eq!(update, ReferenceUpdate::Kept);
        assert_eq!(reference.current().len(), 1);
    }

    #[test]
    fn empty_reference_is_replaced_by_first_non_empty_scan() {
        let mut reference = seeded(&[]);
        assert!(reference.is_initialized());
        let incoming = set(&[(1.0, 2.0, 3.0)]);
        let update = reference.update(&incoming, &detector(ChangeCriterion::VacatedVoxels));
        assert_eq!(update, ReferenceUpdate::Replaced { changed_points: 1 });
        assert_eq!(reference.current(), &incoming);
    }

    #[test]
    fn replacement_takes_incoming_header() {
        let mut reference = seeded(&[(0.0, 0.0, 0.0)]);
        let mut incoming = set(&[(9.0, 9.0, 9.0)]);
        incoming.header.frame_id = "camera".to_string();
        reference.update(&incoming, &detector(ChangeCriterion::VacatedVoxels));
        assert_eq!(reference.current().header.frame_id, "camera");
    }
}
