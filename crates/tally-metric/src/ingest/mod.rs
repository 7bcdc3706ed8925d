//! Ingestion module
//!
//! Turns event trees into measurements:
//! - walker: visits metric leaves of a message tree in document order
//! - measurement: parses status-coded payloads

pub mod measurement;
pub mod walker;

pub use measurement::{DisplayFlags, Measurement, MetricConfig, StatusKind};
pub use walker::{walk, MetricVisitor, WalkStats};
