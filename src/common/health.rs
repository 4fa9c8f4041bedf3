//! Health status model shared by the director and origins
//!
//! The director keeps one entry per server (keyed by server URL) that the
//! external probe subsystem writes; an origin keeps one entry per component
//! it depends on, e.g. `"director"`, written by its heartbeat watchdog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use crate::common::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Ok,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Ok => "ok",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }

    /// Gauge value used in the metrics exposition
    pub fn as_gauge(&self) -> u64 {
        match self {
            HealthStatus::Unknown => 0,
            HealthStatus::Ok => 1,
            HealthStatus::Warning => 2,
            HealthStatus::Critical => 3,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unknown" => Ok(HealthStatus::Unknown),
            "ok" => Ok(HealthStatus::Ok),
            "warning" => Ok(HealthStatus::Warning),
            "critical" => Ok(HealthStatus::Critical),
            other => Err(Error::Validation(format!("unknown health status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
    pub last_update: DateTime<Utc>,
}

/// Lock-guarded map of health reports.
#[derive(Debug, Default)]
pub struct HealthRegistry {
    entries: RwLock<HashMap<String, HealthReport>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, status: HealthStatus, message: impl Into<String>) {
        let report = HealthReport {
            status,
            message: message.into(),
            last_update: Utc::now(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), report);
    }

    pub fn get(&self, key: &str) -> Option<HealthReport> {
        self.read().get(key).cloned()
    }

    /// Status for `key`, `Unknown` when nothing has been reported
    pub fn status_of(&self, key: &str) -> HealthStatus {
        self.read().status_of(key)
    }

    pub fn snapshot(&self) -> HashMap<String, HealthReport> {
        (*self.read().entries).clone()
    }

    /// Hold the read lock for a composed read across many keys.
    pub fn read(&self) -> HealthView<'_> {
        HealthView {
            entries: self.entries.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn to_prometheus(&self) -> String {
        use std::fmt::Write;
        let view = self.read();
        let mut keys: Vec<&String> = view.entries.keys().collect();
        keys.sort();

        let mut out = String::new();
        out.push_str("# HELP fedplane_component_health Health status (0=unknown,1=ok,2=warning,3=critical)\n");
        out.push_str("# TYPE fedplane_component_health gauge\n");
        for key in keys {
            let _ = writeln!(
                out,
                "fedplane_component_health{{component=\"{}\"}} {}",
                key,
                view.entries[key].status.as_gauge()
            );
        }
        out
    }
}

/// A consistent read of the health map.
pub struct HealthView<'a> {
    entries: RwLockReadGuard<'a, HashMap<String, HealthReport>>,
}

impl HealthView<'_> {
    pub fn get(&self, key: &str) -> Option<&HealthReport> {
        self.entries.get(key)
    }

    pub fn status_of(&self, key: &str) -> HealthStatus {
        self.entries
            .get(key)
            .map(|r| r.status)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_unknown() {
        let registry = HealthRegistry::new();
        assert_eq!(registry.status_of("https://cache-1:8443"), HealthStatus::Unknown);
        assert!(registry.get("https://cache-1:8443").is_none());
    }

    #[test]
    fn test_set_overwrites() {
        let registry = HealthRegistry::new();
        registry.set("director", HealthStatus::Warning, "initializing");
        registry.set("director", HealthStatus::Ok, "Director timestamp: 1");

        let report = registry.get("director").unwrap();
        assert_eq!(report.status, HealthStatus::Ok);
        assert_eq!(report.message, "Director timestamp: 1");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("critical".parse::<HealthStatus>().unwrap(), HealthStatus::Critical);
        assert!("degraded".parse::<HealthStatus>().is_err());
    }

    #[test]
    fn test_prometheus_gauge() {
        let registry = HealthRegistry::new();
        registry.set("director", HealthStatus::Critical, "late");
        let out = registry.to_prometheus();
        assert!(out.contains("fedplane_component_health{component=\"director\"} 3"));
    }
}
