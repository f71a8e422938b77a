//! Broadcast bus for completed ordered sequences.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber (visualisers, motion planners, loggers) receives every
//! published sequence without any single subscriber blocking the others.
//! Sequences travel as `Arc<PointSet>`; subscribers share one allocation.

use std::sync::Arc;

use pathscan_types::{PointSet, ScanError};
use tokio::sync::broadcast;
use tracing::warn;

use crate::sink::SequenceSink;

/// Default channel capacity, matching the output queue depth of the
/// sequence detector node.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Shared sequence bus. Clone it cheaply – all clones share the same
/// underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct SequenceBus {
    sender: broadcast::Sender<Arc<PointSet>>,
}

impl SequenceBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0, like [`broadcast::channel`].
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a completed sequence.
    ///
    /// Returns the number of receivers that were handed the sequence, or
    /// [`ScanError::Channel`] when nobody is subscribed.
    pub fn publish(&self, sequence: Arc<PointSet>) -> Result<usize, ScanError> {
        self.sender
            .send(sequence)
            .map_err(|_| ScanError::Channel("no subscribers for ordered sequences".to_string()))
    }

    /// Subscribe to every sequence published from now on.
    pub fn subscribe(&self) -> SequenceReceiver {
        SequenceReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SequenceBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SequenceSink for SequenceBus {
    fn publish(&self, sequence: Arc<PointSet>) -> Result<usize, ScanError> {
        SequenceBus::publish(self, sequence)
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Async receiver for published sequences.
///
/// Obtained via [`SequenceBus::subscribe`].
pub struct SequenceReceiver {
    receiver: broadcast::Receiver<Arc<PointSet>>,
}

impl SequenceReceiver {
    /// Wait for the next published sequence.
    ///
    /// Lagging is logged and skipped: a subscriber that falls behind jumps
    /// to the oldest sequence still buffered.  Returns `None` once the bus
    /// has shut down.
    pub async fn recv(&mut self) -> Option<Arc<PointSet>> {
        loop {
            match self.receiver.recv().await {
                Ok(sequence) => return Some(sequence),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "sequence subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Option<Arc<PointSet>> {
        loop {
            match self.receiver.try_recv() {
                Ok(sequence) => return Some(sequence),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "sequence subscriber lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}
