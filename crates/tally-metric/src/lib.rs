//! # Tally Metric
//!
//! Hourly metric aggregation per product line.
//!
//! ## Pipeline
//!
//! ```text
//! MessageTree ──► walker ──► Measurement::parse ──► ReportRegistry
//!                                                      │
//!                  timer / end of period ──► CheckpointCoordinator
//!                                             ├─► BucketManager (text)
//!                                             ├─► DurableReportStore (binary)
//!                                             └─► TaskScheduler (daily rollup)
//! ```
//!
//! Each report covers one hour and holds, per metric key, 60 one-minute
//! segments of running count/sum/average.

pub mod analyzer;
pub mod checkpoint;
pub mod config;
pub mod infra;
pub mod ingest;
pub mod model;
pub mod ports;

pub use analyzer::{AnalyzerMetrics, IngestSummary, MetricAnalyzer};
pub use checkpoint::{CheckpointMode, CheckpointOutcome, CheckpointStatus};
pub use config::AnalyzerConfig;
pub use ingest::{Measurement, MetricConfig, StatusKind};
pub use model::{MetricItem, MetricKey, Report, ReportRegistry, Segment};
pub use ports::Collaborators;

/// Default analyzer identity
pub const ANALYZER_ID: &str = "metric";

/// Default namespace for scheduled rollup tasks
pub const DEFAULT_TASK_NAMESPACE: &str = "cat";

/// Default domain excluded from default-config registration
pub const RESERVED_DOMAIN: &str = "broker-service";
