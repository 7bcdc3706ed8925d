//! In-memory collaborator implementations
//!
//! Back local mode, tests, and benchmarks. DashMap for keyed state,
//! parking_lot mutexes for append-only logs.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tally_common::Result;
use tracing::debug;

use crate::ingest::MetricConfig;
use crate::ports::{
    BucketManager, BusinessReport, Collaborators, DefaultConfigRegistrar, DurableReportStore,
    ProductLineResolver, ReportBucket, TaskPolicy, TaskScheduler,
};

/// Domain → product line table; unmapped domains are their own product line
#[derive(Debug, Default)]
pub struct StaticProductLines {
    mapping: DashMap<String, String>,
    /// Declared metric type → domains seen emitting it
    domains_by_kind: DashMap<String, BTreeSet<String>>,
}

impl StaticProductLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(self, domain: impl Into<String>, product: impl Into<String>) -> Self {
        self.mapping.insert(domain.into(), product.into());
        self
    }

    pub fn domains_for(&self, kind: &str) -> BTreeSet<String> {
        self.domains_by_kind
            .get(kind)
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

impl ProductLineResolver for StaticProductLines {
    fn resolve(&self, domain: &str) -> String {
        self.mapping
            .get(domain)
            .map(|p| p.clone())
            .unwrap_or_else(|| domain.to_string())
    }

    fn register_domain(&self, kind: &str, domain: &str) {
        self.domains_by_kind
            .entry(kind.to_string())
            .or_default()
            .insert(domain.to_string());
    }
}

/// Default metric configuration keyed by `domain:namespace:name`
#[derive(Debug, Default)]
pub struct InMemoryConfigRegistrar {
    configs: DashMap<String, MetricConfig>,
}

impl InMemoryConfigRegistrar {
    fn key(domain: &str, namespace: &str, metric_name: &str) -> String {
        format!("{}:{}:{}", domain, namespace, metric_name)
    }

    pub fn get(&self, domain: &str, namespace: &str, metric_name: &str) -> Option<MetricConfig> {
        self.configs
            .get(&Self::key(domain, namespace, metric_name))
            .map(|c| c.clone())
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl DefaultConfigRegistrar for InMemoryConfigRegistrar {
    fn register_if_absent(
        &self,
        domain: &str,
        namespace: &str,
        metric_name: &str,
        config: &MetricConfig,
    ) {
        self.configs
            .entry(Self::key(domain, namespace, metric_name))
            .or_insert_with(|| config.clone());
    }
}

type BucketKey = (DateTime<Utc>, String);

/// Buckets held in process memory, surviving close/reopen
#[derive(Debug, Default)]
pub struct InMemoryBucketManager {
    buckets: DashMap<BucketKey, Arc<DashMap<String, String>>>,
    opened: AtomicU64,
    closed: AtomicU64,
}

impl InMemoryBucketManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content stored under `id` in the given scope
    pub fn stored(
        &self,
        period_start: DateTime<Utc>,
        analyzer_id: &str,
        id: &str,
    ) -> Option<String> {
        self.buckets
            .get(&(period_start, analyzer_id.to_string()))
            .and_then(|b| b.get(id).map(|c| c.clone()))
    }

    /// Seed content without going through a checkpoint
    pub fn seed(&self, period_start: DateTime<Utc>, analyzer_id: &str, id: &str, content: &str) {
        self.scope(period_start, analyzer_id)
            .insert(id.to_string(), content.to_string());
    }

    pub fn open_count(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    pub fn close_count(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    fn scope(
        &self,
        period_start: DateTime<Utc>,
        analyzer_id: &str,
    ) -> Arc<DashMap<String, String>> {
        self.buckets
            .entry((period_start, analyzer_id.to_string()))
            .or_default()
            .clone()
    }
}

impl BucketManager for InMemoryBucketManager {
    fn open(
        &self,
        period_start: DateTime<Utc>,
        analyzer_id: &str,
    ) -> Result<Box<dyn ReportBucket>> {
        self.opened.fetch_add(1, Ordering::Relaxed);
        debug!(period = %period_start, analyzer = analyzer_id, "Bucket opened");
        Ok(Box::new(InMemoryBucket {
            entries: self.scope(period_start, analyzer_id),
        }))
    }

    fn close(&self, _bucket: Box<dyn ReportBucket>) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }
}

struct InMemoryBucket {
    entries: Arc<DashMap<String, String>>,
}

impl ReportBucket for InMemoryBucket {
    fn ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<String>> {
        Ok(self.entries.get(id).map(|c| c.clone()))
    }

    fn store_by_id(&mut self, id: &str, content: &str) -> Result<()> {
        self.entries.insert(id.to_string(), content.to_string());
        Ok(())
    }
}

/// Append-only durable record log
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    records: Mutex<Vec<BusinessReport>>,
}

impl InMemoryReportStore {
    pub fn records(&self) -> Vec<BusinessReport> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl DurableReportStore for InMemoryReportStore {
    fn insert(&self, record: BusinessReport) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// A task accepted by [`InMemoryTaskScheduler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub period: DateTime<Utc>,
    pub namespace: String,
    pub analyzer_id: String,
    pub policy: TaskPolicy,
}

#[derive(Debug, Default)]
pub struct InMemoryTaskScheduler {
    tasks: Mutex<Vec<ScheduledTask>>,
}

impl InMemoryTaskScheduler {
    pub fn tasks(&self) -> Vec<ScheduledTask> {
        self.tasks.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl TaskScheduler for InMemoryTaskScheduler {
    fn create_task(
        &self,
        period: DateTime<Utc>,
        namespace: &str,
        analyzer_id: &str,
        policy: TaskPolicy,
    ) -> Result<()> {
        self.tasks.lock().push(ScheduledTask {
            period,
            namespace: namespace.to_string(),
            analyzer_id: analyzer_id.to_string(),
            policy,
        });
        Ok(())
    }
}

/// Concrete in-memory collaborators, kept typed for inspection
#[derive(Clone, Default)]
pub struct MemoryCollaborators {
    pub product_lines: Arc<StaticProductLines>,
    pub config_registrar: Arc<InMemoryConfigRegistrar>,
    pub buckets: Arc<InMemoryBucketManager>,
    pub report_store: Arc<InMemoryReportStore>,
    pub tasks: Arc<InMemoryTaskScheduler>,
}

impl MemoryCollaborators {
    pub fn with_product_lines(mut self, product_lines: StaticProductLines) -> Self {
        self.product_lines = Arc::new(product_lines);
        self
    }

    /// Type-erased handles for the analyzer
    pub fn handles(&self) -> Collaborators {
        Collaborators {
            product_lines: self.product_lines.clone(),
            config_registrar: self.config_registrar.clone(),
            buckets: self.buckets.clone(),
            report_store: self.report_store.clone(),
            tasks: self.tasks.clone(),
        }
    }
}

/// Fresh set of in-memory collaborators
pub fn collaborators() -> MemoryCollaborators {
    MemoryCollaborators::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::BucketGuard;
    use chrono::TimeZone;

    #[test]
    fn test_product_line_fallback() {
        let lines = StaticProductLines::new().with_mapping("orderSvc", "retail");
        assert_eq!(lines.resolve("orderSvc"), "retail");
        assert_eq!(lines.resolve("unknown"), "unknown");

        lines.register_domain("business", "orderSvc");
        lines.register_domain("business", "orderSvc");
        assert_eq!(lines.domains_for("business").len(), 1);
    }

    #[test]
    fn test_registrar_keeps_first() {
        let reg = InMemoryConfigRegistrar::default();
        let first = MetricConfig {
            title: "a".into(),
            show_count: true,
            show_avg: false,
            show_sum: false,
        };
        let second = MetricConfig {
            title: "b".into(),
            ..first.clone()
        };
        reg.register_if_absent("d", "Metric", "m", &first);
        reg.register_if_absent("d", "Metric", "m", &second);
        assert_eq!(reg.get("d", "Metric", "m"), Some(first));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_bucket_guard_closes_once() {
        let manager = InMemoryBucketManager::new();
        let period = Utc.timestamp_millis_opt(0).unwrap();
        {
            let mut bucket = BucketGuard::open(&manager, period, "metric").unwrap();
            bucket.store_by_id("retail", "{}").unwrap();
            assert_eq!(bucket.ids().unwrap(), vec!["retail"]);
        }
        assert_eq!(manager.open_count(), 1);
        assert_eq!(manager.close_count(), 1);
        assert_eq!(manager.stored(period, "metric", "retail").as_deref(), Some("{}"));
        assert_eq!(manager.stored(period, "other", "retail"), None);
    }
}
