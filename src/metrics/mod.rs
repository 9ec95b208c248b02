use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Counters kept by the display controller.
#[derive(Debug, Default, Clone)]
pub struct SwitchMetrics {
    received: u64,
    applied: u64,
    redundant: u64,
    dropped: u64,
    load_failures: u64,
}

impl SwitchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&mut self) {
        self.received = self.received.saturating_add(1);
    }

    pub fn record_applied(&mut self) {
        self.applied = self.applied.saturating_add(1);
    }

    pub fn record_redundant(&mut self) {
        self.redundant = self.redundant.saturating_add(1);
    }

    pub fn record_dropped(&mut self) {
        self.dropped = self.dropped.saturating_add(1);
    }

    pub fn record_load_failure(&mut self) {
        self.load_failures = self.load_failures.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            received: self.received,
            applied: self.applied,
            redundant: self.redundant,
            dropped: self.dropped,
            load_failures: self.load_failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub received: u64,
    pub applied: u64,
    pub redundant: u64,
    pub dropped: u64,
    pub load_failures: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(
            LogLevel::Info,
            target.to_string(),
            "switch_metrics".to_string(),
            self.as_fields(),
        )
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("received".to_string(), json!(self.received));
        map.insert("applied".to_string(), json!(self.applied));
        map.insert("redundant".to_string(), json!(self.redundant));
        map.insert("dropped".to_string(), json!(self.dropped));
        map.insert("load_failures".to_string(), json!(self.load_failures));
        map
    }
}
