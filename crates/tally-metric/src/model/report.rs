//! Hourly metric report
//!
//! `Report` → `MetricItem` (per metric key) → `Segment` (per minute of hour).
//! Every level is created on first use.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_common::{HourWindow, Result, TallyError, SEGMENTS_PER_HOUR};

use crate::ingest::{Measurement, StatusKind};

/// Namespace tag every metric key is built with
pub const METRIC_NAMESPACE: &str = "Metric";

/// Composite key: domain, namespace tag, metric name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MetricKey {
    pub domain: String,
    pub name: String,
}

impl MetricKey {
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.domain, METRIC_NAMESPACE, self.name)
    }
}

impl From<MetricKey> for String {
    fn from(key: MetricKey) -> Self {
        key.to_string()
    }
}

/// Splits at the first `:Metric:`. A name may contain the marker, a domain
/// may not: such a key restores with the marker moved into its name.
impl TryFrom<String> for MetricKey {
    type Error = TallyError;

    fn try_from(raw: String) -> Result<Self> {
        let marker = format!(":{}:", METRIC_NAMESPACE);
        let (domain, name) = raw
            .split_once(&marker)
            .ok_or_else(|| TallyError::Serialization(format!("invalid metric key: {raw}")))?;
        Ok(Self::new(domain, name))
    }
}

/// One-minute aggregation slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Minute of hour, `0..60`
    pub id: u8,
    pub count: u64,
    pub sum: f64,
    /// `sum / count`; left at its previous value while `count == 0`
    pub avg: f64,
}

impl Segment {
    fn new(id: u8) -> Self {
        Self {
            id,
            count: 0,
            sum: 0.0,
            avg: 0.0,
        }
    }

    /// Fold one sample into the running statistics
    pub fn add(&mut self, count: u64, value: f64) {
        self.count = self.count.saturating_add(count);
        self.sum += value;
        if self.count > 0 {
            self.avg = self.sum / self.count as f64;
        }
    }
}

/// Per-metric aggregation bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricItem {
    pub key: MetricKey,
    /// Domains that contributed samples
    pub domains: BTreeSet<String>,
    /// Encoding of the most recent sample
    pub kind: Option<StatusKind>,
    segments: BTreeMap<u8, Segment>,
}

impl MetricItem {
    pub fn new(key: MetricKey) -> Self {
        Self {
            key,
            domains: BTreeSet::new(),
            kind: None,
            segments: BTreeMap::new(),
        }
    }

    pub fn add_domain(&mut self, domain: &str) -> &mut Self {
        if !self.domains.contains(domain) {
            self.domains.insert(domain.to_string());
        }
        self
    }

    pub fn set_kind(&mut self, kind: StatusKind) -> &mut Self {
        self.kind = Some(kind);
        self
    }

    /// Get or create the slot for `minute`
    pub fn find_or_create_segment(&mut self, minute: u8) -> Result<&mut Segment> {
        if minute >= SEGMENTS_PER_HOUR {
            return Err(TallyError::InvalidMinute(minute as i64));
        }
        Ok(self
            .segments
            .entry(minute)
            .or_insert_with(|| Segment::new(minute)))
    }

    pub fn segment(&self, minute: u8) -> Option<&Segment> {
        self.segments.get(&minute)
    }

    /// Populated slots in minute order
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }
}

/// Hourly summary for one product line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub product: String,
    window: HourWindow,
    items: BTreeMap<MetricKey, MetricItem>,
}

impl Report {
    pub fn new(product: impl Into<String>, window: HourWindow) -> Self {
        Self {
            product: product.into(),
            window,
            items: BTreeMap::new(),
        }
    }

    pub fn window(&self) -> HourWindow {
        self.window
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.window.start
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.window.end
    }

    pub fn find_or_create_item(&mut self, key: MetricKey) -> &mut MetricItem {
        self.items
            .entry(key)
            .or_insert_with_key(|key| MetricItem::new(key.clone()))
    }

    pub fn item(&self, key: &MetricKey) -> Option<&MetricItem> {
        self.items.get(key)
    }

    pub fn items(&self) -> impl Iterator<Item = &MetricItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Fold a measurement taken at `timestamp_ms` into this report
    pub fn apply(
        &mut self,
        key: MetricKey,
        measurement: &Measurement,
        timestamp_ms: i64,
    ) -> Result<()> {
        let minute = tally_common::minute_of_hour(timestamp_ms);
        let domain = key.domain.clone();
        let item = self.find_or_create_item(key);

        item.add_domain(&domain).set_kind(measurement.kind);
        item.find_or_create_segment(minute)?.add(measurement.count, measurement.value);
        Ok(())
    }
}
