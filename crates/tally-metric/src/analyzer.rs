//! Metric analyzer
//!
//! Ingests message trees into per-product-line hourly reports and drives
//! checkpoints. Ingestion and checkpointing share one registry behind a
//! single mutex: ingestion holds it for one measurement at a time, a
//! checkpoint holds it only to clone or detach the reports. No collaborator
//! call is ever made while it is held.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tally_common::{HourWindow, MessageTree, Metric};
use tracing::{debug, error, info, instrument, warn};

use crate::checkpoint::{codec, CheckpointCoordinator, CheckpointMode, CheckpointOutcome};
use crate::config::AnalyzerConfig;
use crate::ingest::{walk, Measurement, MetricVisitor, WalkStats};
use crate::model::{MetricKey, Report, ReportRegistry, METRIC_NAMESPACE};
use crate::ports::{BucketGuard, Collaborators};

/// Analyzer counters
#[derive(Debug, Default)]
pub struct AnalyzerMetrics {
    pub trees_processed: AtomicU64,
    pub measurements_aggregated: AtomicU64,
    pub malformed_payloads: AtomicU64,
    pub unknown_statuses: AtomicU64,
    pub checkpoints: AtomicU64,
    pub checkpoint_failures: AtomicU64,
}

/// Per-tree ingestion summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub walk: WalkStats,
    pub aggregated: usize,
    pub malformed: usize,
    pub unknown_status: usize,
}

/// Hourly metric analyzer
pub struct MetricAnalyzer {
    config: AnalyzerConfig,
    collaborators: Collaborators,
    coordinator: CheckpointCoordinator,
    registry: Mutex<ReportRegistry>,
    metrics: AnalyzerMetrics,
}

impl MetricAnalyzer {
    /// Analyzer for the hour starting at `period_start`
    pub fn new(
        config: AnalyzerConfig,
        collaborators: Collaborators,
        period_start: DateTime<Utc>,
    ) -> Self {
        let coordinator = CheckpointCoordinator::new(&config, &collaborators);
        Self {
            config,
            collaborators,
            coordinator,
            registry: Mutex::new(ReportRegistry::new(period_start)),
            metrics: AnalyzerMetrics::default(),
        }
    }

    /// Analyzer for the hour containing now
    pub fn for_current_hour(config: AnalyzerConfig, collaborators: Collaborators) -> Self {
        Self::new(config, collaborators, HourWindow::containing(Utc::now()).start)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &AnalyzerMetrics {
        &self.metrics
    }

    pub fn period_start(&self) -> DateTime<Utc> {
        self.registry.lock().period_start()
    }

    /// Fold one message tree into the current reports
    ///
    /// Malformed payloads are dropped one measurement at a time; nothing
    /// is reported back to the caller.
    #[instrument(skip(self, tree), fields(domain = %tree.domain))]
    pub fn process(&self, tree: &MessageTree) -> IngestSummary {
        let product = self.collaborators.product_lines.resolve(&tree.domain);

        // A tree with no metrics still gets a report for its product line.
        self.registry.lock().get_or_create(&product);

        let mut ingest = TreeIngest {
            analyzer: self,
            domain: &tree.domain,
            product: &product,
            summary: IngestSummary::default(),
        };
        ingest.summary.walk = walk(&tree.message, &mut ingest);
        let summary = ingest.summary;

        self.metrics.trees_processed.fetch_add(1, Ordering::Relaxed);
        debug!(
            product = %product,
            aggregated = summary.aggregated,
            malformed = summary.malformed,
            "Tree processed"
        );
        summary
    }

    /// Current report for `product`, or an empty one for this hour
    ///
    /// Never inserts into the registry.
    pub fn report(&self, product: &str) -> Report {
        self.registry.lock().peek(product)
    }

    /// Product lines with a report this hour
    pub fn products(&self) -> Vec<String> {
        let mut products: Vec<String> = self
            .registry
            .lock()
            .reports()
            .map(|r| r.product.clone())
            .collect();
        products.sort();
        products
    }

    /// Run a checkpoint over the current reports
    ///
    /// A final checkpoint with `reset_on_final_checkpoint` detaches the
    /// finished hour and moves the registry to the next one under the same
    /// lock, so events arriving during store I/O land in the new hour.
    /// Otherwise the reports are cloned and stay live.
    pub fn checkpoint(&self, at_end: bool) -> CheckpointOutcome {
        let mode = if at_end {
            CheckpointMode::Final
        } else {
            CheckpointMode::Periodic
        };
        let detach = at_end && self.config.reset_on_final_checkpoint;
        let (period_start, reports) = {
            let mut registry = self.registry.lock();
            let period_start = registry.period_start();
            if detach {
                (period_start, registry.advance())
            } else {
                (period_start, registry.snapshot())
            }
        };
        if detach {
            info!(
                period = %period_start,
                reports = reports.len(),
                "Registry advanced to next hour"
            );
        }

        let outcome = self.coordinator.run(period_start, &reports, mode);

        self.metrics.checkpoints.fetch_add(1, Ordering::Relaxed);
        if !outcome.is_success() {
            self.metrics
                .checkpoint_failures
                .fetch_add(1, Ordering::Relaxed);
        }

        outcome
    }

    /// Restore reports stored for the current period
    ///
    /// Returns how many reports were installed.
    #[instrument(skip(self))]
    pub fn load_reports(&self) -> usize {
        let period_start = self.period_start();
        let restored = match self.read_bucket(period_start) {
            Ok(restored) => restored,
            Err(e) => {
                error!(error = %e, "Error when loading metric reports of {}", period_start);
                return 0;
            }
        };

        let mut registry = self.registry.lock();
        if registry.period_start() != period_start {
            warn!(period = %period_start, "Period rolled over while loading; discarding");
            return 0;
        }
        let count = restored.len();
        for report in restored {
            registry.insert(report);
        }
        info!(count, period = %period_start, "Metric reports loaded");
        count
    }

    fn read_bucket(&self, period_start: DateTime<Utc>) -> tally_common::Result<Vec<Report>> {
        let bucket = BucketGuard::open(
            self.collaborators.buckets.as_ref(),
            period_start,
            &self.config.analyzer_id,
        )?;

        let mut restored = Vec::new();
        for id in bucket.ids()? {
            let decoded = bucket
                .find_by_id(&id)
                .and_then(|text| text.map(|t| codec::decode_text(&t)).transpose());
            match decoded {
                Ok(Some(report)) => restored.push(report),
                Ok(None) => debug!(id = %id, "Bucket entry vanished"),
                Err(e) => warn!(id = %id, error = %e, "Skipping undecodable report"),
            }
        }
        Ok(restored)
    }

    /// Discard all reports and start the hour at `next_period_start`
    pub fn roll_over(&self, next_period_start: DateTime<Utc>) {
        let mut registry = self.registry.lock();
        let dropped = registry.len();
        registry.reset(next_period_start);
        info!(period = %next_period_start, dropped, "Rolled over to new period");
    }

    /// Spawn the periodic checkpoint loop
    ///
    /// Checkpoints run on the blocking pool; collaborator I/O is synchronous.
    pub fn start_checkpointer(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.checkpoint_interval());
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                let analyzer = self.clone();
                match tokio::task::spawn_blocking(move || analyzer.checkpoint(false)).await {
                    Ok(outcome) if !outcome.is_success() => {
                        warn!(status = ?outcome.status, "Periodic checkpoint degraded")
                    }
                    Ok(_) => {}
                    Err(e) => error!("Periodic checkpoint task failed: {}", e),
                }
            }
        })
    }

    fn ingest_metric(&self, domain: &str, product: &str, metric: &Metric) -> IngestResult {
        if !metric.kind.is_empty() {
            self.collaborators
                .product_lines
                .register_domain(&metric.kind, domain);
        }

        let measurement = match Measurement::parse(&metric.status, &metric.data) {
            Ok(Some(m)) => m,
            Ok(None) => {
                self.metrics.unknown_statuses.fetch_add(1, Ordering::Relaxed);
                return IngestResult::Unknown;
            }
            Err(e) => {
                self.metrics.malformed_payloads.fetch_add(1, Ordering::Relaxed);
                warn!(
                    metric = %metric.name,
                    status = %metric.status,
                    error = %e,
                    "Dropping malformed metric"
                );
                return IngestResult::Malformed;
            }
        };

        let key = MetricKey::new(domain, &metric.name);
        let applied = self
            .registry
            .lock()
            .get_or_create(product)
            .apply(key, &measurement, metric.timestamp);
        if let Err(e) = applied {
            warn!(metric = %metric.name, error = %e, "Failed to apply measurement");
            return IngestResult::Malformed;
        }
        self.metrics
            .measurements_aggregated
            .fetch_add(1, Ordering::Relaxed);

        if !metric.kind.is_empty() && domain != self.config.reserved_domain {
            self.collaborators.config_registrar.register_if_absent(
                domain,
                METRIC_NAMESPACE,
                &metric.name,
                &measurement.config(&metric.name),
            );
        }
        IngestResult::Aggregated
    }
}

enum IngestResult {
    Aggregated,
    Malformed,
    Unknown,
}

struct TreeIngest<'a> {
    analyzer: &'a MetricAnalyzer,
    domain: &'a str,
    product: &'a str,
    summary: IngestSummary,
}

impl MetricVisitor for TreeIngest<'_> {
    fn visit_metric(&mut self, metric: &Metric) {
        match self.analyzer.ingest_metric(self.domain, self.product, metric) {
            IngestResult::Aggregated => self.summary.aggregated += 1,
            IngestResult::Malformed => self.summary.malformed += 1,
            IngestResult::Unknown => self.summary.unknown_status += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::{self, StaticProductLines};
    use chrono::TimeZone;
    use tally_common::{Transaction, HOUR_MS, MINUTE_MS};

    const BASE: i64 = HOUR_MS * 400_000;

    fn analyzer(config: AnalyzerConfig) -> (MetricAnalyzer, memory::MemoryCollaborators) {
        let collab = memory::collaborators()
            .with_product_lines(StaticProductLines::new().with_mapping("orderSvc", "retail"));
        let period = Utc.timestamp_millis_opt(BASE).unwrap();
        (MetricAnalyzer::new(config, collab.handles(), period), collab)
    }

    fn at(minute: i64) -> i64 {
        BASE + minute * MINUTE_MS
    }

    #[test]
    fn test_timing_leaves_in_one_minute() {
        let (analyzer, _) = analyzer(AnalyzerConfig::default());
        let tree = MessageTree::new(
            "orderSvc",
            Transaction::new("URL", "/order")
                .with_child(Metric::new("latency", "T", "120.0", at(12)))
                .with_child(Metric::new("latency", "T", "80.0", at(12) + 30_000)),
        );

        let summary = analyzer.process(&tree);
        assert_eq!(summary.aggregated, 2);

        let report = analyzer.report("retail");
        let item = report.item(&MetricKey::new("orderSvc", "latency")).unwrap();
        let seg = item.segment(12).unwrap();
        assert_eq!(seg.count, 2);
        assert_eq!(seg.sum, 200.0);
        assert_eq!(seg.avg, 100.0);
    }

    #[test]
    fn test_malformed_leaf_is_isolated() {
        let (analyzer, _) = analyzer(AnalyzerConfig::default());
        let tree = MessageTree::new(
            "orderSvc",
            Transaction::new("URL", "/order")
                .with_child(Metric::new("orders", "C", "oops", at(1)))
                .with_child(Metric::new("orders", "C", "4", at(1)))
                .with_child(Metric::new("orders", "Z", "4", at(1))),
        );

        let summary = analyzer.process(&tree);
        assert_eq!(summary.aggregated, 1);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.unknown_status, 1);
        assert_eq!(analyzer.metrics().malformed_payloads.load(Ordering::Relaxed), 1);

        let report = analyzer.report("retail");
        let seg = report
            .item(&MetricKey::new("orderSvc", "orders"))
            .unwrap()
            .segment(1)
            .unwrap();
        assert_eq!(seg.count, 4);
    }

    #[test]
    fn test_report_peek_does_not_grow_registry() {
        let (analyzer, _) = analyzer(AnalyzerConfig::default());
        let a = analyzer.report("travel");
        let b = analyzer.report("travel");
        assert_eq!(a.window(), b.window());
        assert_eq!(a.start_time().timestamp_millis(), BASE);
        assert!(analyzer.products().is_empty());
    }

    #[test]
    fn test_config_registration_rules() {
        let config = AnalyzerConfig {
            reserved_domain: "broker-service".into(),
            ..Default::default()
        };
        let (analyzer, collab) = analyzer(config);

        analyzer.process(&MessageTree::new(
            "orderSvc",
            Metric::new("orders", "C", "1", at(0)).with_kind("business"),
        ));
        analyzer.process(&MessageTree::new(
            "orderSvc",
            Metric::new("untyped", "C", "1", at(0)),
        ));
        analyzer.process(&MessageTree::new(
            "broker-service",
            Metric::new("probe", "C", "1", at(0)).with_kind("business"),
        ));

        let registrar = &collab.config_registrar;
        assert!(registrar.get("orderSvc", "Metric", "orders").unwrap().show_count);
        assert!(registrar.get("orderSvc", "Metric", "untyped").is_none());
        assert!(registrar.get("broker-service", "Metric", "probe").is_none());

        // Reserved domain still aggregates.
        let broker = analyzer.report("broker-service");
        assert_eq!(broker.len(), 1);

        let domains = collab.product_lines.domains_for("business");
        assert!(domains.contains("orderSvc"));
        assert!(domains.contains("broker-service"));
    }

    #[test]
    fn test_final_checkpoint_resets_registry() {
        let (analyzer, collab) = analyzer(AnalyzerConfig::default());
        analyzer.process(&MessageTree::new(
            "orderSvc",
            Metric::new("orders", "C", "2", at(5)),
        ));

        let outcome = analyzer.checkpoint(true);
        assert!(outcome.is_success());
        assert_eq!(outcome.period_start.timestamp_millis(), BASE);
        assert!(analyzer.products().is_empty());
        assert_eq!(collab.report_store.len(), 1);
        assert_eq!(analyzer.period_start().timestamp_millis(), BASE + HOUR_MS);
        assert_eq!(
            analyzer.report("retail").start_time().timestamp_millis(),
            BASE + HOUR_MS
        );
    }

    #[test]
    fn test_final_checkpoint_can_retain_registry() {
        let config = AnalyzerConfig {
            reset_on_final_checkpoint: false,
            ..Default::default()
        };
        let (analyzer, _) = analyzer(config);
        analyzer.process(&MessageTree::new(
            "orderSvc",
            Metric::new("orders", "C", "2", at(5)),
        ));

        analyzer.checkpoint(true);
        assert_eq!(analyzer.products(), vec!["retail"]);
    }

    #[test]
    fn test_roll_over_moves_window() {
        let (analyzer, _) = analyzer(AnalyzerConfig::default());
        analyzer.process(&MessageTree::new(
            "orderSvc",
            Metric::new("orders", "C", "2", at(5)),
        ));

        let next = Utc.timestamp_millis_opt(BASE + HOUR_MS).unwrap();
        analyzer.roll_over(next);

        assert!(analyzer.products().is_empty());
        assert_eq!(analyzer.report("retail").start_time(), next);
    }

    #[test]
    fn test_load_reports_restores_checkpoint() {
        let (first, collab) = analyzer(AnalyzerConfig::default());
        first.process(&MessageTree::new(
            "orderSvc",
            Metric::new("orders", "C", "7", at(3)),
        ));
        first.checkpoint(false);

        let period = Utc.timestamp_millis_opt(BASE).unwrap();
        let second = MetricAnalyzer::new(AnalyzerConfig::default(), collab.handles(), period);
        collab.buckets.seed(period, "metric", "junk", "not a report");

        assert_eq!(second.load_reports(), 1);
        assert_eq!(second.report("retail"), first.report("retail"));
        assert_eq!(collab.buckets.open_count(), collab.buckets.close_count());
    }
}
