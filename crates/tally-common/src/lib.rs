//! # Tally Common
//!
//! Shared vocabulary for the Tally telemetry aggregation pipeline.
//!
//! ## Core Types
//!
//! - [`MessageTree`]: one instrumented request, tagged with its source domain
//! - [`Message`]: polymorphic tree node (transaction, metric, or other)
//! - [`TallyError`]/[`ParseError`]: unified error types
//!
//! ## Time
//!
//! - [`types::period`]: hour windows and minute-of-hour bucketing

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ParseError, Result, TallyError};
pub use types::{
    message::{Message, MessageTree, Metric, Transaction},
    period::{minute_of_hour, HourWindow},
};

/// Tally version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Milliseconds in one minute
pub const MINUTE_MS: i64 = 60_000;

/// Milliseconds in one hour
pub const HOUR_MS: i64 = 60 * MINUTE_MS;

/// Number of minute segments in an hourly report
pub const SEGMENTS_PER_HOUR: u8 = 60;
