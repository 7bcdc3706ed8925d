//! Product line → current hourly report
//!
//! The registry owns every in-memory report of one period. It is not
//! internally synchronized; the analyzer guards it with a single mutex held
//! only for one get-or-create/update, never across store I/O.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tally_common::HourWindow;

use super::report::Report;

/// Reports of the current period, keyed by product line
#[derive(Debug, Clone)]
pub struct ReportRegistry {
    window: HourWindow,
    reports: HashMap<String, Report>,
}

impl ReportRegistry {
    /// Empty registry for the hour starting at `period_start`
    pub fn new(period_start: DateTime<Utc>) -> Self {
        Self {
            window: HourWindow::starting_at(period_start),
            reports: HashMap::new(),
        }
    }

    pub fn window(&self) -> HourWindow {
        self.window
    }

    pub fn period_start(&self) -> DateTime<Utc> {
        self.window.start
    }

    /// Existing report for `product`, or a freshly inserted empty one
    pub fn get_or_create(&mut self, product: &str) -> &mut Report {
        let window = self.window;
        self.reports
            .entry(product.to_string())
            .or_insert_with(|| Report::new(product, window))
    }

    /// Existing report for `product`, or an empty one with the same window
    /// that is not inserted
    pub fn peek(&self, product: &str) -> Report {
        self.reports
            .get(product)
            .cloned()
            .unwrap_or_else(|| Report::new(product, self.window))
    }

    pub fn get(&self, product: &str) -> Option<&Report> {
        self.reports.get(product)
    }

    /// Install a restored report, replacing any report for the same product
    pub fn insert(&mut self, report: Report) -> Option<Report> {
        self.reports.insert(report.product.clone(), report)
    }

    pub fn reports(&self) -> impl Iterator<Item = &Report> {
        self.reports.values()
    }

    /// Clone every report, sorted by product line
    pub fn snapshot(&self) -> Vec<Report> {
        let mut reports: Vec<Report> = self.reports.values().cloned().collect();
        reports.sort_by(|a, b| a.product.cmp(&b.product));
        reports
    }

    /// Take every report, sorted by product line, and move to the next hour
    pub fn advance(&mut self) -> Vec<Report> {
        let next = ReportRegistry::new(self.window.next().start);
        let finished = std::mem::replace(self, next);
        let mut reports: Vec<Report> = finished.reports.into_values().collect();
        reports.sort_by(|a, b| a.product.cmp(&b.product));
        reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Drop every report and move to the hour starting at `period_start`
    pub fn reset(&mut self, period_start: DateTime<Utc>) {
        self.reports.clear();
        self.window = HourWindow::starting_at(period_start);
    }
}
