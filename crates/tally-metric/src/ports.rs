//! External collaborator interfaces
//!
//! The analyzer never talks to transport, storage, or scheduling directly.
//! All calls are synchronous and may block; callers keep them off any lock.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_common::Result;

use crate::ingest::MetricConfig;

/// Maps domains onto product lines
pub trait ProductLineResolver: Send + Sync {
    /// Product line a domain reports under
    fn resolve(&self, domain: &str) -> String;

    /// Record that `domain` emits metrics of declared type `kind`
    fn register_domain(&self, kind: &str, domain: &str);
}

/// Registry of default per-metric display configuration
pub trait DefaultConfigRegistrar: Send + Sync {
    fn register_if_absent(
        &self,
        domain: &str,
        namespace: &str,
        metric_name: &str,
        config: &MetricConfig,
    );
}

/// Keyed text storage scoped to one (period, analyzer)
pub trait ReportBucket: Send {
    fn ids(&self) -> Result<Vec<String>>;

    fn find_by_id(&self, id: &str) -> Result<Option<String>>;

    fn store_by_id(&mut self, id: &str, content: &str) -> Result<()>;
}

/// Opens and releases report buckets
pub trait BucketManager: Send + Sync {
    fn open(&self, period_start: DateTime<Utc>, analyzer_id: &str)
        -> Result<Box<dyn ReportBucket>>;

    fn close(&self, bucket: Box<dyn ReportBucket>);
}

/// An open bucket that is closed exactly once, when dropped
pub struct BucketGuard<'a> {
    manager: &'a dyn BucketManager,
    bucket: Box<dyn ReportBucket>,
}

impl<'a> BucketGuard<'a> {
    pub fn open(
        manager: &'a dyn BucketManager,
        period_start: DateTime<Utc>,
        analyzer_id: &str,
    ) -> Result<Self> {
        let bucket = manager.open(period_start, analyzer_id)?;
        Ok(Self { manager, bucket })
    }

    /// Release the bucket now instead of at scope end
    pub fn close(self) {}
}

impl Deref for BucketGuard<'_> {
    type Target = dyn ReportBucket;

    fn deref(&self) -> &Self::Target {
        self.bucket.as_ref()
    }
}

impl DerefMut for BucketGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.bucket.as_mut()
    }
}

impl Drop for BucketGuard<'_> {
    fn drop(&mut self) {
        let bucket = std::mem::replace(&mut self.bucket, Box::new(ClosedBucket));
        self.manager.close(bucket);
    }
}

/// Stand-in that rejects every call on a closed guard
struct ClosedBucket;

impl ReportBucket for ClosedBucket {
    fn ids(&self) -> Result<Vec<String>> {
        Err(closed())
    }

    fn find_by_id(&self, _id: &str) -> Result<Option<String>> {
        Err(closed())
    }

    fn store_by_id(&mut self, _id: &str, _content: &str) -> Result<()> {
        Err(closed())
    }
}

fn closed() -> tally_common::TallyError {
    tally_common::TallyError::Storage("bucket already closed".into())
}

/// Encoding of a durable record's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContentType {
    Binary = 1,
}

/// Durable snapshot of one report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessReport {
    /// Analyzer identity
    pub name: String,
    pub product_line: String,
    pub period: DateTime<Utc>,
    /// Address of the host that aggregated the report
    pub ip: String,
    pub content_type: ContentType,
    pub content: Vec<u8>,
    pub creation_date: DateTime<Utc>,
}

/// Long-term report storage
pub trait DurableReportStore: Send + Sync {
    fn insert(&self, record: BusinessReport) -> Result<()>;
}

/// Rollup cadence for scheduled tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskPolicy {
    Daily,
}

/// Downstream rollup scheduler
pub trait TaskScheduler: Send + Sync {
    fn create_task(
        &self,
        period: DateTime<Utc>,
        namespace: &str,
        analyzer_id: &str,
        policy: TaskPolicy,
    ) -> Result<()>;
}

/// Every collaborator an analyzer needs
#[derive(Clone)]
pub struct Collaborators {
    pub product_lines: Arc<dyn ProductLineResolver>,
    pub config_registrar: Arc<dyn DefaultConfigRegistrar>,
    pub buckets: Arc<dyn BucketManager>,
    pub report_store: Arc<dyn DurableReportStore>,
    pub tasks: Arc<dyn TaskScheduler>,
}
