//! Checkpoint module
//!
//! - codec: text (round-trip) and binary (write-only) report encodings
//! - coordinator: writes registry snapshots to bucket and durable stores

pub mod codec;
pub mod coordinator;

pub use coordinator::{
    CheckpointCoordinator, CheckpointMode, CheckpointOutcome, CheckpointStatus, ReportFailure,
};
