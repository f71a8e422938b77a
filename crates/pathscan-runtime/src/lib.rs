//! `pathscan-runtime` – the sequence detector node.
//!
//! Wires the perception algorithms to the middleware and runs them once per
//! incoming scan.
//!
//! # Modules
//!
//! - [`config`] – [`DetectorConfig`]: voxel resolution, seed axis, cluster
//!   size and queue depths, validated once at startup.
//! - [`detector`] – [`SequenceDetector`]: the per-scan state machine
//!   (change check → reference update → path build → publish) and sole owner
//!   of the reference scene.
//! - [`service`] – [`ScanService`]: runs a detector on its own task behind a
//!   bounded ingestion queue so scans are processed one at a time.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.

pub mod config;
pub mod detector;
pub mod service;
pub mod telemetry;

pub use config::DetectorConfig;
pub use detector::{ScanOutcome, SequenceDetector, Stage};
pub use service::{ScanHandle, ScanService};
pub use telemetry::{init_tracing, TracerProviderGuard};
