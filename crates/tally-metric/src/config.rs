//! Metric analyzer configuration

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Metric analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Analyzer identity used for bucket scoping, durable records and tasks
    pub analyzer_id: String,
    /// Single-node mode: skip durable persistence and task scheduling
    pub local_mode: bool,
    /// Address recorded on durable records
    pub host_address: String,
    /// Namespace passed to the task scheduler
    pub task_namespace: String,
    /// Seconds between periodic checkpoints
    pub checkpoint_interval_secs: u64,
    /// Empty the registry after every final checkpoint
    pub reset_on_final_checkpoint: bool,
    /// Domain whose metrics are aggregated but kept out of the default
    /// configuration registry
    pub reserved_domain: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            analyzer_id: crate::ANALYZER_ID.to_string(),
            local_mode: false,
            host_address: "127.0.0.1".to_string(),
            task_namespace: crate::DEFAULT_TASK_NAMESPACE.to_string(),
            checkpoint_interval_secs: 60,
            reset_on_final_checkpoint: true,
            reserved_domain: crate::RESERVED_DOMAIN.to_string(),
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from environment (and `.env` if present)
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Build from an arbitrary `TALLY_*` variable source
    ///
    /// Values that fail to parse leave the default in place.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(id) = lookup("TALLY_ANALYZER_ID") {
            cfg.analyzer_id = id;
        }
        if let Some(v) = lookup("TALLY_LOCAL_MODE").and_then(|v| parse_bool(&v)) {
            cfg.local_mode = v;
        }
        if let Some(addr) = lookup("TALLY_HOST_ADDRESS") {
            cfg.host_address = addr;
        }
        if let Some(ns) = lookup("TALLY_TASK_NAMESPACE") {
            cfg.task_namespace = ns;
        }
        if let Some(v) = lookup("TALLY_CHECKPOINT_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            cfg.checkpoint_interval_secs = v;
        }
        if let Some(v) = lookup("TALLY_RESET_ON_FINAL_CHECKPOINT").and_then(|v| parse_bool(&v)) {
            cfg.reset_on_final_checkpoint = v;
        }
        if let Some(domain) = lookup("TALLY_RESERVED_DOMAIN") {
            cfg.reserved_domain = domain;
        }

        cfg
    }

    /// Periodic checkpoint interval, never shorter than one second
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs.max(1))
    }

    /// Local-mode variant of this configuration
    pub fn local(mut self) -> Self {
        self.local_mode = true;
        self
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
