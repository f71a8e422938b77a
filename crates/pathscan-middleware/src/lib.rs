//! `pathscan-middleware` – delivery of ordered sequences.
//!
//! Moves completed sequences from the detector to whoever needs them,
//! without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`sink`] – [`SequenceSink`]: the single downstream sink a detector
//!   publishes to, plus an in-memory [`RecordingSink`][sink::RecordingSink].
//! - [`bus`] – [`SequenceBus`]: broadcast fan-out of published sequences
//!   built on Tokio broadcast channels.
//! - [`snapshot`] – [`SnapshotStore`] / [`SnapshotReader`]: swap-on-completion
//!   store answering "what is the latest sequence?" at any time.

pub mod bus;
pub mod sink;
pub mod snapshot;

pub use bus::{SequenceBus, SequenceReceiver};
pub use sink::{RecordingSink, SequenceSink};
pub use snapshot::{SnapshotReader, SnapshotStore};
