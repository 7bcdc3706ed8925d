//! Aggregation model
//!
//! - Report: hourly container for one product line
//! - MetricItem: per metric key, 60 lazily created minute segments
//! - ReportRegistry: product line → current report

pub mod registry;
pub mod report;

pub use registry::ReportRegistry;
pub use report::{MetricItem, MetricKey, Report, Segment, METRIC_NAMESPACE};
