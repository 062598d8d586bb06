use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::sync::{Arc, Mutex};

pub type SharedMetrics = Arc<Mutex<ViewMetrics>>;

/// Counters accumulated by composites, collection views and routers.
#[derive(Debug, Default, Clone)]
pub struct ViewMetrics {
    registrations: u64,
    deregistrations: u64,
    delegated_dispatches: u64,
    dispatch_misses: u64,
    reconciliations: u64,
    route_dispatches: u64,
    unmatched_fragments: u64,
}

impl ViewMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedMetrics {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn record_registration(&mut self) {
        self.registrations = self.registrations.saturating_add(1);
    }

    pub fn record_deregistration(&mut self) {
        self.deregistrations = self.deregistrations.saturating_add(1);
    }

    pub fn record_dispatch(&mut self, hit: bool) {
        if hit {
            self.delegated_dispatches = self.delegated_dispatches.saturating_add(1);
        } else {
            self.dispatch_misses = self.dispatch_misses.saturating_add(1);
        }
    }

    pub fn record_reconciliation(&mut self) {
        self.reconciliations = self.reconciliations.saturating_add(1);
    }

    /// Records one fragment change; `fired` is the number of callbacks it invoked.
    pub fn record_route(&mut self, fired: usize) {
        if fired == 0 {
            self.unmatched_fragments = self.unmatched_fragments.saturating_add(1);
        } else {
            self.route_dispatches = self.route_dispatches.saturating_add(fired as u64);
        }
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            registrations: self.registrations,
            deregistrations: self.deregistrations,
            delegated_dispatches: self.delegated_dispatches,
            dispatch_misses: self.dispatch_misses,
            reconciliations: self.reconciliations,
            route_dispatches: self.route_dispatches,
            unmatched_fragments: self.unmatched_fragments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub registrations: u64,
    pub deregistrations: u64,
    pub delegated_dispatches: u64,
    pub dispatch_misses: u64,
    pub reconciliations: u64,
    pub route_dispatches: u64,
    pub unmatched_fragments: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "view_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("registrations".to_string(), json!(self.registrations));
        map.insert("deregistrations".to_string(), json!(self.deregistrations));
        map.insert(
            "delegated_dispatches".to_string(),
            json!(self.delegated_dispatches),
        );
        map.insert("dispatch_misses".to_string(), json!(self.dispatch_misses));
        map.insert("reconciliations".to_string(), json!(self.reconciliations));
        map.insert("route_dispatches".to_string(), json!(self.route_dispatches));
        map.insert(
            "unmatched_fragments".to_string(),
            json!(self.unmatched_fragments),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_records_split_hits_and_misses() {
        let mut metrics = ViewMetrics::new();
        metrics.record_route(2);
        metrics.record_route(0);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.route_dispatches, 2);
        assert_eq!(snapshot.unmatched_fragments, 1);
    }

    #[test]
    fn snapshot_converts_to_log_event() {
        let mut metrics = ViewMetrics::new();
        metrics.record_registration();
        metrics.record_dispatch(false);
        let event = metrics.snapshot().to_log_event("room_views::metrics");
        assert_eq!(event.message, "view_metrics");
        assert_eq!(event.field("registrations"), Some(&json!(1)));
        assert_eq!(event.field("dispatch_misses"), Some(&json!(1)));
    }
}
