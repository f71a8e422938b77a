//! Shrinking nearest-neighbour working set for the path walk.
//!
//! [`NeighborSet`] indexes the finite points of a slice in a mutable
//! [`kiddo`] k-d tree, keyed by their position in the slice.  The path
//! walk queries it with [`nearest`][NeighborSet::nearest] and consumes
//! points with [`remove`][NeighborSet::remove], which deletes the item
//! from its leaf in place.
//!
//! # Ordering
//!
//! Hits come back closest first.  Equal distances are ordered with the
//! `preferred` index first, then by index.  Which of several equally
//! distant points make it into the first `k` is decided by the tree's own
//! enumeration order, except that a live `preferred` point always does.
//! Queries are deterministic for a given point set and removal history.
//!
//! # Crowded planes
//!
//! A kiddo leaf cannot be split when all of its items share one
//! coordinate on the split axis.  When some axis value is shared by
//! [`BUCKET_SIZE`] or more points (a flat wall at quantized depth, a pile
//! of duplicates) the set answers queries with a linear scan instead.
//!
//! # Example
//!
//! ```rust
//! use pathscan_perception::neighbors::NeighborSet;
//! use pathscan_types::Point;
//!
//! let pts = [
//!     Point::new(0.0, 0.0, 0.0),
//!     Point::new(1.0, 0.0, 0.0),
//!     Point::new(5.0, 0.0, 0.0),
//! ];
//! let mut set = NeighborSet::build(&pts);
//!
//! let hits = set.nearest(&pts[0], 2, Some(0));
//! assert_eq!(hits.iter().map(|n| n.index).collect::<Vec<_>>(), vec![0, 1]);
//!
//! set.remove(1);
//! let hits = set.nearest(&pts[0], 2, Some(0));
//! assert_eq!(hits.iter().map(|n| n.index).collect::<Vec<_>>(), vec![0, 2]);
//! ```

use std::collections::HashMap;

use kiddo::distance_metric::DistanceMetric;
use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use pathscan_types::Point;
use tracing::{debug, warn};

/// Leaf bucket size of the k-d tree.
pub const BUCKET_SIZE: usize = 256;

type PointTree = KdTree<f32, u64, 3, BUCKET_SIZE, u32>;

/// One search hit: a slice index and its squared distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance_squared: f32,
}

enum Backend {
    Tree(PointTree),
    Scan,
}

/// Live points of a slice, queried by proximity and consumed one by one.
pub struct NeighborSet {
    positions: Vec<[f32; 3]>,
    live: Vec<bool>,
    len: usize,
    backend: Backend,
}

impl NeighborSet {
    /// Index every finite point of `points`.
    ///
    /// Points with a NaN or infinite coordinate are never live; see
    /// [`unindexed`][Self::unindexed].
    pub fn build(points: &[Point]) -> Self {
        let positions: Vec<[f32; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
        let live: Vec<bool> = points.iter().map(Point::is_finite).collect();
        let len = live.iter().filter(|l| **l).count();

        let backend = match crowded_axis(&positions, &live) {
            Some(axis) => {
                warn!(axis, points = len, "too many points share one plane; using linear scan");
                Backend::Scan
            }
            None => {
                let mut tree = PointTree::with_capacity(len);
                for (i, pos) in positions.iter().enumerate().filter(|(i, _)| live[*i]) {
                    tree.add(pos, i as u64);
                }
                Backend::Tree(tree)
            }
        };
        debug!(points = len, skipped = points.len() - len, "neighbour set built");

        Self {
            positions,
            live,
            len,
            backend,
        }
    }

    /// Number of live points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when queries go through the k-d tree rather than a linear scan.
    pub fn uses_tree(&self) -> bool {
        matches!(self.backend, Backend::Tree(_))
    }

    pub fn contains(&self, index: usize) -> bool {
        self.live.get(index).copied().unwrap_or(false)
    }

    /// Remove `index`.  Returns `false` if it was unknown or already gone.
    pub fn remove(&mut self, index: usize) -> bool {
        if !self.contains(index) {
            return false;
        }
        self.live[index] = false;
        self.len -= 1;
        if let Backend::Tree(tree) = &mut self.backend
            && tree.remove(&self.positions[index], index as u64) != 1
        {
            warn!(index, "k-d tree removal missed its item");
        }
        true
    }

    /// Live indices, ascending.
    pub fn live_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.live
            .iter()
            .enumerate()
            .filter_map(|(i, live)| live.then_some(i))
    }

    /// Indices that were never indexed because a coordinate is not finite.
    pub fn unindexed(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions
            .iter()
            .enumerate()
            .filter_map(|(i, p)| (!p.iter().all(|c| c.is_finite())).then_some(i))
    }

    /// Up to `k` live points nearest to `query`, closest first.
    ///
    /// A live `preferred` point is always included when it is among the
    /// nearest, and leads every group of equal distances.  Pass the query's
    /// own index so it heads its own result list.
    pub fn nearest(&self, query: &Point, k: usize, preferred: Option<usize>) -> Vec<Neighbor> {
        if k == 0 || self.len == 0 {
            return Vec::new();
        }
        let q = [query.x, query.y, query.z];

        let mut hits: Vec<Neighbor> = match &self.backend {
            Backend::Tree(tree) => tree
                .nearest_n::<SquaredEuclidean>(&q, k)
                .into_iter()
                .map(|n| Neighbor {
                    index: n.item as usize,
                    distance_squared: n.distance,
                })
                .collect(),
            Backend::Scan => self
                .live_indices()
                .map(|index| self.neighbor(index, &q))
                .collect(),
        };

        if let Some(p) = preferred.filter(|p| self.contains(*p))
            && !hits.iter().any(|n| n.index == p)
        {
            hits.push(self.neighbor(p, &q));
        }

        let rank = |n: &Neighbor| u8::from(preferred != Some(n.index));
        hits.sort_by(|a, b| {
            a.distance_squared
                .total_cmp(&b.distance_squared)
                .then(rank(a).cmp(&rank(b)))
                .then(a.index.cmp(&b.index))
        });
        hits.truncate(k);
        hits
    }

    fn neighbor(&self, index: usize, q: &[f32; 3]) -> Neighbor {
        Neighbor {
            index,
            distance_squared: SquaredEuclidean::dist(&self.positions[index], q),
        }
    }
}

/// First axis on which `BUCKET_SIZE` or more live points share a value.
fn crowded_axis(positions: &[[f32; 3]], live: &[bool]) -> Option<usize> {
    (0..3).find(|&axis| {
        let mut counts: HashMap<u32, usize> = HashMap::new();
        positions
            .iter()
            .zip(live)
            .filter(|(_, live)| **live)
            .any(|(p, _)| {
                // -0.0 and 0.0 compare equal in the tree.
                let v = if p[axis] == 0.0 { 0.0f32 } else { p[axis] };
                let count = counts.entry(v.to_bits()).or_insert(0);
                *count += 1;
                *count >= BUCKET_SIZE
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random cloud (64-bit LCG).
    fn cloud(n: usize, seed: u64) -> Vec<Point> {
        let mut state = seed;
        let mut next = || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 40) % 1000) as f32 / 100.0
        };
        (0..n).map(|_| Point::new(next(), next(), next())).collect()
    }

    /// Sorted squared distances of the `k` nearest live points.
    fn brute_force_distances(pts: &[Point], alive: &[bool], q: &Point, k: usize) -> Vec<f32> {
        let q = [q.x, q.y, q.z];
        let mut all: Vec<f32> = pts
            .iter()
            .zip(alive)
            .filter(|(_, a)| **a)
            .map(|(p, _)| SquaredEuclidean::dist(&[p.x, p.y, p.z], &q))
            .collect();
        all.sort_by(f32::total_cmp);
        all.truncate(k);
        all
    }

    fn distances(hits: &[Neighbor]) -> Vec<f32> {
        hits.iter().map(|n| n.distance_squared).collect()
    }

    fn indices(hits: &[Neighbor]) -> Vec<usize> {
        hits.iter().map(|n| n.index).collect()
    }

    #[test]
    fn empty_set_returns_nothing() {
        let set = NeighborSet::build(&[]);
        assert!(set.is_empty());
        assert!(set.nearest(&Point::new(0.0, 0.0, 0.0), 3, None).is_empty());
    }

    #[test]
    fn zero_k_returns_nothing() {
        let set = NeighborSet::build(&[Point::new(0.0, 0.0, 0.0)]);
        assert!(set.nearest(&Point::new(0.0, 0.0, 0.0), 0, Some(0)).is_empty());
    }

    #[test]
    fn k_larger_than_live_returns_all_live() {
        let pts = cloud(5, 7);
        let set = NeighborSet::build(&pts);
        assert!(set.uses_tree());
        assert_eq!(set.nearest(&pts[0], 50, None).len(), 5);
    }

    #[test]
    fn matches_brute_force_with_removals() {
        let pts = cloud(300, 42);
        let mut set = NeighborSet::build(&pts);
        let mut alive = vec![true; pts.len()];

        for step in 0..150 {
            let victim = (step * 7) % pts.len();
            assert_eq!(set.remove(victim), alive[victim]);
            alive[victim] = false;

            let q = pts[(step * 13) % pts.len()];
            let k = 1 + step % 6;
            assert_eq!(
                distances(&set.nearest(&q, k, None)),
                brute_force_distances(&pts, &alive, &q, k),
                "mismatch at step {step}"
            );
        }
        assert_eq!(set.len(), alive.iter().filter(|a| **a).count());
    }

    #[test]
    fn preferred_index_leads_its_duplicates() {
        let pts = [Point::new(1.0, 1.0, 1.0); 3];
        let set = NeighborSet::build(&pts);
        assert_eq!(indices(&set.nearest(&pts[2], 3, Some(2))), vec![2, 0, 1]);
        assert_eq!(indices(&set.nearest(&pts[2], 3, None)), vec![0, 1, 2]);
    }

    #[test]
    fn preferred_index_is_never_crowded_out() {
        let pts = [Point::new(2.0, 0.0, 0.0); 10];
        let set = NeighborSet::build(&pts);
        for k in 1..4 {
            assert_eq!(set.nearest(&pts[7], k, Some(7))[0].index, 7);
        }
    }

    #[test]
    fn removed_preferred_index_is_not_returned() {
        let pts = cloud(6, 9);
        let mut set = NeighborSet::build(&pts);
        set.remove(3);
        assert!(!indices(&set.nearest(&pts[3], 6, Some(3))).contains(&3));
    }

    #[test]
    fn non_finite_points_are_not_indexed() {
        let pts = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(f32::NAN, 1.0, 1.0),
            Point::new(1.0, f32::INFINITY, 0.0),
            Point::new(2.0, 0.0, 0.0),
        ];
        let mut set = NeighborSet::build(&pts);
        assert_eq!(set.len(), 2);
        assert_eq!(set.unindexed().collect::<Vec<_>>(), vec![1, 2]);
        assert!(!set.remove(1));
        assert_eq!(indices(&set.nearest(&pts[0], 4, Some(0))), vec![0, 3]);
    }

    #[test]
    fn crowded_plane_falls_back_to_scan() {
        // A flat wall: every point shares z = 1.5.
        let pts: Vec<Point> = (0..BUCKET_SIZE + 44)
            .map(|i| Point::new((i % 20) as f32, (i / 20) as f32, 1.5))
            .collect();
        let mut set = NeighborSet::build(&pts);
        assert!(!set.uses_tree());

        let mut alive = vec![true; pts.len()];
        for victim in [0, 5, 77, 120] {
            assert!(set.remove(victim));
            alive[victim] = false;
        }
        let q = pts[33];
        assert_eq!(
            distances(&set.nearest(&q, 9, Some(33))),
            brute_force_distances(&pts, &alive, &q, 9)
        );
        assert_eq!(set.nearest(&q, 9, Some(33))[0].index, 33);
    }

    #[test]
    fn signed_zeros_count_as_one_plane() {
        let pts: Vec<Point> = (0..BUCKET_SIZE)
            .map(|i| Point::new(if i % 2 == 0 { 0.0 } else { -0.0 }, i as f32, 0.5 * i as f32))
            .collect();
        assert!(!NeighborSet::build(&pts).uses_tree());
    }

    #[test]
    fn remove_is_idempotent() {
        let pts = cloud(4, 3);
        let mut set = NeighborSet::build(&pts);
        assert!(set.remove(2));
        assert!(!set.remove(2));
        assert!(!set.remove(99));
        assert_eq!(set.len(), 3);
        assert!(!set.contains(2));
        assert_eq!(set.live_indices().collect::<Vec<_>>(), vec![0, 1, 3]);
    }

    #[test]
    fn removing_everything_empties_the_set() {
        let pts = cloud(17, 5);
        let mut set = NeighborSet::build(&pts);
        for i in 0..pts.len() {
            set.remove(i);
        }
        assert!(set.is_empty());
        assert!(set.nearest(&pts[0], 3, None).is_empty());
    }
}
