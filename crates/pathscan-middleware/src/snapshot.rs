//! Latest-sequence snapshot for query-style collaborators.
//!
//! The detector swaps each completed sequence into a
//! [`tokio::sync::watch`] channel in one step, so a reader either sees the
//! previous sequence or the new one, never a half-built buffer.  Before the
//! first scan the snapshot is an empty set.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pathscan_middleware::snapshot::SnapshotStore;
//! use pathscan_types::{Header, Point, PointSet};
//!
//! let store = SnapshotStore::new();
//! let reader = store.reader();
//! assert!(reader.coordinates().is_empty());
//!
//! store.store(Arc::new(PointSet::new(Header::default(), vec![Point::new(1.0, 2.0, 3.0)])));
//! assert_eq!(reader.coordinates().len(), 1);
//! ```

use std::sync::Arc;

use pathscan_types::{Coordinate, PointSet};
use tokio::sync::watch;

/// Writer side, owned by the sequence detector.
#[derive(Debug)]
pub struct SnapshotStore {
    sender: watch::Sender<Arc<PointSet>>,
}

impl SnapshotStore {
    /// A store holding the empty sequence.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(PointSet::empty()));
        Self { sender }
    }

    /// Replace the published sequence.
    pub fn store(&self, sequence: Arc<PointSet>) {
        self.sender.send_replace(sequence);
    }

    /// A read handle; any number may exist.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn latest(&self) -> Arc<PointSet> {
        self.sender.borrow().clone()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read handle on the most recent sequence.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    receiver: watch::Receiver<Arc<PointSet>>,
}

impl SnapshotReader {
    /// The most recently published sequence.
    pub fn latest(&self) -> Arc<PointSet> {
        self.receiver.borrow().clone()
    }

    /// The most recent sequence as a flat list of coordinates; empty before
    /// anything has been produced.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.receiver.borrow().coordinates()
    }

    /// Wait until a sequence newer than the last one seen by this reader is
    /// stored.  Returns `false` if the store has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Mark the current sequence as seen and return it.
    pub fn latest_and_mark_seen(&mut self) -> Arc<PointSet> {
        self.receiver.borrow_and_update().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathscan_types::{Header, Point};

    fn sequence(n: usize) -> Arc<PointSet> {
        Arc::new(PointSet::new(
            Header::default(),
            (0..n).map(|i| Point::new(i as f32, 1.0, 2.0)).collect(),
        ))
    }

    #[test]
    fn empty_before_first_store() {
        let store = SnapshotStore::new();
        assert!(store.reader().latest().is_empty());
        assert!(store.reader().coordinates().is_empty());
    }

    #[test]
    fn reader_sees_latest_store() {
        let store = SnapshotStore::new();
        let reader = store.reader();
        store.store(sequence(2));
        store.store(sequence(5));
        assert_eq!(reader.latest().len(), 5);
        assert_eq!(reader.coordinates()[4], Coordinate { x: 4.0, y: 1.0, z: 2.0 });
    }

    #[test]
    fn stored_arc_is_shared_not_copied() {
        let store = SnapshotStore::new();
        let seq = sequence(3);
        store.store(seq.clone());
        assert!(Arc::ptr_eq(&store.latest(), &seq));
    }

    #[tokio::test]
    async fn changed_wakes_on_store() {
        let store = SnapshotStore::new();
        let mut reader = store.reader();

        let waiter = tokio::spawn(async move {
            let woke = reader.changed().await;
            (woke, reader.latest_and_mark_seen().len())
        });
        tokio::task::yield_now().await;
        store.store(sequence(7));

        let (woke, len) = waiter.await.expect("join");
        assert!(woke);
        assert_eq!(len, 7);
    }

    #[tokio::test]
    async fn changed_reports_dropped_store() {
        let store = SnapshotStore::new();
        let mut reader = store.reader();
        drop(store);
        assert!(!reader.changed().await);
    }
}
