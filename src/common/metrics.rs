//! Prometheus-compatible counters for the control plane
//!
//! Each service owns one `Metrics` instance; nothing here is process-global.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counter for tracking event counts
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Outcomes of object stat queries
#[derive(Debug, Default)]
pub struct QueryCounters {
    pub satisfied: Counter,
    pub insufficient: Counter,
    pub not_found: Counter,
    pub no_prefix: Counter,
    pub invalid: Counter,
}

/// Results of individual stat probes
#[derive(Debug, Default)]
pub struct ProbeCounters {
    pub ok: Counter,
    pub not_found: Counter,
    pub error: Counter,
    pub timeout: Counter,
}

/// Director test reports received by an origin
#[derive(Debug, Default)]
pub struct HeartbeatCounters {
    pub ok: Counter,
    pub error: Counter,
    pub invalid: Counter,
    pub expiries: Counter,
}

#[derive(Debug)]
pub struct Metrics {
    pub queries: QueryCounters,
    pub probes: ProbeCounters,
    pub toggles_applied: Counter,
    pub toggles_conflict: Counter,
    pub heartbeats: HeartbeatCounters,

    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            queries: QueryCounters::default(),
            probes: ProbeCounters::default(),
            toggles_applied: Counter::new(),
            toggles_conflict: Counter::new(),
            heartbeats: HeartbeatCounters::default(),
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-compatible metrics output
    pub fn to_prometheus(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();

        out.push_str("# HELP fedplane_stat_queries_total Object stat queries by outcome\n");
        out.push_str("# TYPE fedplane_stat_queries_total counter\n");
        for (outcome, counter) in [
            ("satisfied", &self.queries.satisfied),
            ("insufficient", &self.queries.insufficient),
            ("not_found", &self.queries.not_found),
            ("no_prefix", &self.queries.no_prefix),
            ("invalid", &self.queries.invalid),
        ] {
            let _ = writeln!(
                out,
                "fedplane_stat_queries_total{{outcome=\"{}\"}} {}",
                outcome,
                counter.get()
            );
        }

        out.push_str("# HELP fedplane_stat_probes_total Stat probes by result\n");
        out.push_str("# TYPE fedplane_stat_probes_total counter\n");
        for (result, counter) in [
            ("ok", &self.probes.ok),
            ("not_found", &self.probes.not_found),
            ("error", &self.probes.error),
            ("timeout", &self.probes.timeout),
        ] {
            let _ = writeln!(
                out,
                "fedplane_stat_probes_total{{result=\"{}\"}} {}",
                result,
                counter.get()
            );
        }

        out.push_str("# HELP fedplane_override_toggles_total Server override toggles by result\n");
        out.push_str("# TYPE fedplane_override_toggles_total counter\n");
        let _ = writeln!(
            out,
            "fedplane_override_toggles_total{{result=\"applied\"}} {}",
            self.toggles_applied.get()
        );
        let _ = writeln!(
            out,
            "fedplane_override_toggles_total{{result=\"conflict\"}} {}",
            self.toggles_conflict.get()
        );

        out.push_str("# HELP fedplane_heartbeat_reports_total Director test reports by status\n");
        out.push_str("# TYPE fedplane_heartbeat_reports_total counter\n");
        for (status, counter) in [
            ("ok", &self.heartbeats.ok),
            ("error", &self.heartbeats.error),
            ("invalid", &self.heartbeats.invalid),
        ] {
            let _ = writeln!(
                out,
                "fedplane_heartbeat_reports_total{{status=\"{}\"}} {}",
                status,
                counter.get()
            );
        }

        out.push_str("# HELP fedplane_heartbeat_deadline_expiries_total Missed heartbeat deadlines\n");
        out.push_str("# TYPE fedplane_heartbeat_deadline_expiries_total counter\n");
        let _ = writeln!(
            out,
            "fedplane_heartbeat_deadline_expiries_total {}",
            self.heartbeats.expiries.get()
        );

        out.push_str("# HELP fedplane_uptime_seconds Server uptime in seconds\n");
        out.push_str("# TYPE fedplane_uptime_seconds gauge\n");
        let _ = writeln!(out, "fedplane_uptime_seconds {}", self.uptime_seconds());

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();

        assert_eq!(counter.get(), 0);
        counter.inc();
        assert_eq!(counter.get(), 1);
        counter.add(5);
        assert_eq!(counter.get(), 6);
    }

    #[test]
    fn test_prometheus_output() {
        let metrics = Metrics::new();
        metrics.queries.insufficient.inc();
        metrics.toggles_conflict.add(2);
        metrics.heartbeats.expiries.inc();

        let out = metrics.to_prometheus();
        assert!(out.contains("fedplane_stat_queries_total{outcome=\"insufficient\"} 1"));
        assert!(out.contains("fedplane_override_toggles_total{result=\"conflict\"} 2"));
        assert!(out.contains("fedplane_heartbeat_deadline_expiries_total 1"));
    }
}
