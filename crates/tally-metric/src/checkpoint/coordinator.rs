//! Checkpoint coordinator
//!
//! One invocation:
//!
//! 1. Open the bucket scoped to (period start, analyzer id)
//! 2. Encode and store every report; per-report failures are recorded and
//!    the loop continues
//! 3. Close the bucket (also on any early exit)
//! 4. Final + non-local only: insert a durable binary record per report,
//!    then schedule exactly one daily rollup task for the period
//!
//! Nothing here returns an error to the caller; the outcome carries it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_common::Result;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::codec;
use crate::config::AnalyzerConfig;
use crate::model::Report;
use crate::ports::{
    BucketGuard, BucketManager, BusinessReport, Collaborators, ContentType, DurableReportStore,
    TaskPolicy, TaskScheduler,
};

/// Why a checkpoint runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointMode {
    /// Timer-driven snapshot during the period
    Periodic,
    /// End-of-period snapshot
    Final,
}

impl CheckpointMode {
    pub fn is_final(&self) -> bool {
        matches!(self, CheckpointMode::Final)
    }
}

/// Aggregate status of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointStatus {
    Success,
    /// At least one report, record, or the task failed; the rest went through
    Partial,
    /// The bucket could not be opened; nothing was written
    Failed,
}

/// A report that could not be handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFailure {
    pub product: String,
    pub error: String,
}

/// Result of one checkpoint invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointOutcome {
    pub checkpoint_id: Uuid,
    pub mode: CheckpointMode,
    pub period_start: DateTime<Utc>,
    pub status: CheckpointStatus,
    /// Products stored in the bucket
    pub stored: Vec<String>,
    pub store_failures: Vec<ReportFailure>,
    /// Products inserted into the durable store
    pub persisted: Vec<String>,
    pub persist_failures: Vec<ReportFailure>,
    pub task_scheduled: bool,
    /// Bucket-open or scheduling error
    pub error: Option<String>,
}

impl CheckpointOutcome {
    fn new(mode: CheckpointMode, period_start: DateTime<Utc>) -> Self {
        Self {
            checkpoint_id: Uuid::now_v7(),
            mode,
            period_start,
            status: CheckpointStatus::Success,
            stored: Vec::new(),
            store_failures: Vec::new(),
            persisted: Vec::new(),
            persist_failures: Vec::new(),
            task_scheduled: false,
            error: None,
        }
    }

    fn degrade(&mut self) {
        if self.status == CheckpointStatus::Success {
            self.status = CheckpointStatus::Partial;
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CheckpointStatus::Success
    }
}

/// Writes registry snapshots to the bucket and durable stores
pub struct CheckpointCoordinator {
    analyzer_id: String,
    task_namespace: String,
    host_address: String,
    local_mode: bool,
    buckets: Arc<dyn BucketManager>,
    report_store: Arc<dyn DurableReportStore>,
    tasks: Arc<dyn TaskScheduler>,
}

impl CheckpointCoordinator {
    pub fn new(config: &AnalyzerConfig, collaborators: &Collaborators) -> Self {
        Self {
            analyzer_id: config.analyzer_id.clone(),
            task_namespace: config.task_namespace.clone(),
            host_address: config.host_address.clone(),
            local_mode: config.local_mode,
            buckets: collaborators.buckets.clone(),
            report_store: collaborators.report_store.clone(),
            tasks: collaborators.tasks.clone(),
        }
    }

    /// Run one checkpoint over `reports`
    pub fn run(
        &self,
        period_start: DateTime<Utc>,
        reports: &[Report],
        mode: CheckpointMode,
    ) -> CheckpointOutcome {
        let mut outcome = CheckpointOutcome::new(mode, period_start);
        let span = info_span!(
            "checkpoint",
            id = %outcome.checkpoint_id,
            analyzer = %self.analyzer_id,
            ?mode,
            period = %period_start
        );
        let _entered = span.enter();

        if let Err(e) = self.store_reports(period_start, reports, &mut outcome) {
            error!(error = %e, "Error when storing metric reports of {}", period_start);
            outcome.status = CheckpointStatus::Failed;
            outcome.error = Some(e.to_string());
            return outcome;
        }

        if mode.is_final() && !self.local_mode {
            self.persist_reports(period_start, reports, &mut outcome);
            self.schedule_rollup(period_start, &mut outcome);
        }

        info!(
            status = ?outcome.status,
            stored = outcome.stored.len(),
            persisted = outcome.persisted.len(),
            task_scheduled = outcome.task_scheduled,
            "Checkpoint complete"
        );
        outcome
    }

    fn store_reports(
        &self,
        period_start: DateTime<Utc>,
        reports: &[Report],
        outcome: &mut CheckpointOutcome,
    ) -> Result<()> {
        let mut bucket = BucketGuard::open(self.buckets.as_ref(), period_start, &self.analyzer_id)?;

        for report in reports {
            let stored = codec::encode_text(report)
                .and_then(|text| bucket.store_by_id(&report.product, &text));

            match stored {
                Ok(()) => {
                    debug!(product = %report.product, items = report.len(), "Report stored");
                    outcome.stored.push(report.product.clone());
                }
                Err(e) => {
                    error!(product = %report.product, error = %e, "Failed to store report");
                    outcome.store_failures.push(ReportFailure {
                        product: report.product.clone(),
                        error: e.to_string(),
                    });
                    outcome.degrade();
                }
            }
        }

        bucket.close();
        Ok(())
    }

    fn persist_reports(
        &self,
        period_start: DateTime<Utc>,
        reports: &[Report],
        outcome: &mut CheckpointOutcome,
    ) {
        for report in reports {
            let inserted = codec::encode_binary(report).and_then(|content| {
                self.report_store.insert(BusinessReport {
                    name: self.analyzer_id.clone(),
                    product_line: report.product.clone(),
                    period: period_start,
                    ip: self.host_address.clone(),
                    content_type: ContentType::Binary,
                    content,
                    creation_date: Utc::now(),
                })
            });

            match inserted {
                Ok(()) => outcome.persisted.push(report.product.clone()),
                Err(e) => {
                    let content =
                        codec::encode_text(report).unwrap_or_else(|_| format!("{:?}", report));
                    error!(
                        product = %report.product,
                        error = %e,
                        report = %content,
                        "Failed to persist durable report"
                    );
                    outcome.persist_failures.push(ReportFailure {
                        product: report.product.clone(),
                        error: e.to_string(),
                    });
                    outcome.degrade();
                }
            }
        }
    }

    fn schedule_rollup(&self, period_start: DateTime<Utc>, outcome: &mut CheckpointOutcome) {
        match self.tasks.create_task(
            period_start,
            &self.task_namespace,
            &self.analyzer_id,
            TaskPolicy::Daily,
        ) {
            Ok(()) => outcome.task_scheduled = true,
            Err(e) => {
                warn!(error = %e, "Failed to schedule rollup task");
                outcome.error = Some(e.to_string());
                outcome.degrade();
            }
        }
    }
}
