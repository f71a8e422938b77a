//! The downstream side of the sequence detector.
//!
//! The detector never speaks to a transport directly.  It hands every
//! completed sequence to exactly one [`SequenceSink`]; the sink decides how
//! it reaches the outside world (the in-process
//! [`SequenceBus`][crate::bus::SequenceBus], a ROS topic bridge, a file
//! recorder, …).

use std::sync::{Arc, Mutex};

use pathscan_types::{PointSet, ScanError};

/// Receives each completed ordered sequence.
///
/// # Contract
///
/// * `publish` is called once per processed scan, after the sequence is
///   complete.  It must not block on slow consumers.
/// * The returned count is the number of consumers that were handed the
///   sequence.  An `Err` is logged by the caller and does not abort the scan.
pub trait SequenceSink: Send + Sync {
    fn publish(&self, sequence: Arc<PointSet>) -> Result<usize, ScanError>;
}

/// Sink that keeps every sequence in memory.
///
/// Handy for batch runs and tests where no live subscriber exists.
#[derive(Debug, Default)]
pub struct RecordingSink {
    recorded: Mutex<Vec<Arc<PointSet>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All sequences published so far, oldest first.
    pub fn recorded(&self) -> Vec<Arc<PointSet>> {
        self.recorded
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl SequenceSink for RecordingSink {
    fn publish(&self, sequence: Arc<PointSet>) -> Result<usize, ScanError> {
        let mut guard = self
            .recorded
            .lock()
            .map_err(|e| ScanError::Channel(format!("recording sink poisoned: {e}")))?;
        guard.push(sequence);
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.publish(Arc::new(PointSet::empty())).unwrap();
        let mut second = PointSet::empty();
        second.header.frame_id = "second".to_string();
        sink.publish(Arc::new(second)).unwrap();

        let recorded = sink.recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].header.frame_id, "second");
    }
}
