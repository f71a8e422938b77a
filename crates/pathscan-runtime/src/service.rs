//! [`ScanService`] – asynchronous scan ingestion.
//!
//! Wraps a [`SequenceDetector`] in a dedicated blocking task fed by a
//! bounded [`mpsc`] queue.  Scans are processed strictly one after another,
//! each to completion, in arrival order.  When the queue is full,
//! [`ScanHandle::submit`] waits and [`ScanHandle::try_submit`] fails, so a
//! fast sensor can never pile up unbounded work.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pathscan_middleware::SequenceBus;
//! use pathscan_runtime::{DetectorConfig, ScanService, SequenceDetector};
//! use pathscan_types::PointSet;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = Arc::new(SequenceBus::default());
//! let detector = SequenceDetector::new(DetectorConfig::default(), bus)?;
//! let handle = ScanService::spawn(detector);
//!
//! handle.submit(PointSet::empty()).await?;
//! let detector = handle.shutdown().await?;
//! assert_eq!(detector.scans_processed(), 1);
//! # Ok(())
//! # }
//! ```

use pathscan_middleware::SnapshotReader;
use pathscan_types::{PointSet, ScanError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::detector::SequenceDetector;

/// Spawner for the ingestion task.
pub struct ScanService;

impl ScanService {
    /// Move `detector` onto a blocking task and return the handle used to
    /// feed it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(detector: SequenceDetector) -> ScanHandle {
        let depth = detector.config().ingest_queue.max(1);
        let (tx, rx) = mpsc::channel(depth);
        let snapshot = detector.snapshot();
        let task = tokio::task::spawn_blocking(move || run(detector, rx));
        info!(queue_depth = depth, "scan service started");
        ScanHandle { tx, snapshot, task }
    }
}

fn run(mut detector: SequenceDetector, mut rx: mpsc::Receiver<PointSet>) -> SequenceDetector {
    while let Some(scan) = rx.blocking_recv() {
        let outcome = detector.process_scan(scan);
        debug!(
            points = outcome.sequence.len(),
            took_incoming = outcome.update.took_incoming(),
            "scan processed"
        );
    }
    info!(scans = detector.scans_processed(), "scan ingestion closed");
    detector
}

/// Feeding and query handle of a running [`ScanService`].
pub struct ScanHandle {
    tx: mpsc::Sender<PointSet>,
    snapshot: SnapshotReader,
    task: JoinHandle<SequenceDetector>,
}

impl ScanHandle {
    /// Queue `scan`, waiting while the ingestion queue is full.
    pub async fn submit(&self, scan: PointSet) -> Result<(), ScanError> {
        self.tx
            .send(scan)
            .await
            .map_err(|_| ScanError::Channel("scan service has stopped".to_string()))
    }

    /// Queue `scan` without waiting.
    pub fn try_submit(&self, scan: PointSet) -> Result<(), ScanError> {
        self.tx.try_send(scan).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                ScanError::Channel("scan ingestion queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                ScanError::Channel("scan service has stopped".to_string())
            }
        })
    }

    /// Read handle on the latest ordered sequence.
    pub fn snapshot(&self) -> SnapshotReader {
        self.snapshot.clone()
    }

    /// Stop accepting scans, finish the queued ones, and hand the detector
    /// back.
    pub async fn shutdown(self) -> Result<SequenceDetector, ScanError> {
        drop(self.tx);
        self.task
            .await
            .map_err(|e| ScanError::Channel(format!("scan service task failed: {e}")))
    }
}
