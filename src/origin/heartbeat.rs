//! Director heartbeat watchdog
//!
//! The director periodically sends a test report to each origin. Receipt of
//! any report proves the director is alive; the report body separately says
//! whether the director's test of this origin succeeded. The two are tracked
//! apart:
//!
//! - liveness: `Healthy` while reports keep arriving within the window,
//!   `Degraded` once a window passes without one
//! - application health: the `director` component in the [`HealthRegistry`]
//!
//! A missed window marks the component `Critical` and re-arms, so a silent
//! director produces one expiry per window until reports resume.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::common::{Error, HealthRegistry, HealthStatus, Metrics, Result};

/// Health component written by the watchdog
pub const DIRECTOR_COMPONENT: &str = "director";

/// Body of a director test report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatReport {
    /// `"ok"` or `"error"`
    pub status: String,
    #[serde(default)]
    pub message: String,
    /// Director's clock, passed through as sent
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Healthy,
    Degraded,
}

#[derive(Debug)]
struct Timer {
    /// `None` while stopped
    deadline: Option<Instant>,
    liveness: Liveness,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    component: String,
    window: Duration,
    health: Arc<HealthRegistry>,
    metrics: Arc<Metrics>,
    timer: Mutex<Timer>,
}

impl Inner {
    fn timer(&self) -> MutexGuard<'_, Timer> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_deadline(&self) -> Option<Instant> {
        self.timer().deadline
    }

    /// Fire for `armed` unless a signal moved the deadline first.
    fn expire(&self, armed: Instant) {
        let mut timer = self.timer();
        if timer.deadline != Some(armed) {
            return;
        }
        timer.deadline = Some(Instant::now() + self.window);
        timer.liveness = Liveness::Degraded;
        self.health.set(
            &self.component,
            HealthStatus::Critical,
            "No director test report received within the time limit",
        );
        self.metrics.heartbeats.expiries.inc();
        warn!(
            component = %self.component,
            window_secs = self.window.as_secs(),
            "heartbeat deadline exceeded"
        );
    }
}

async fn run_deadline_loop(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    debug!(component = %inner.component, "heartbeat deadline loop starting");
    while let Some(deadline) = inner.current_deadline() {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep_until(deadline) => inner.expire(deadline),
        }
    }
    debug!(component = %inner.component, "heartbeat deadline loop stopped");
}

/// Watchdog over a periodic liveness report.
pub struct HeartbeatDeadlineMonitor {
    inner: Arc<Inner>,
}

impl HeartbeatDeadlineMonitor {
    pub fn new(
        component: &str,
        window: Duration,
        health: Arc<HealthRegistry>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                component: component.to_string(),
                window,
                health,
                metrics,
                timer: Mutex::new(Timer {
                    deadline: None,
                    liveness: Liveness::Healthy,
                    shutdown: None,
                    handle: None,
                }),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Arm the deadline and spawn the expiry loop. Calling it again while
    /// running only restarts the window.
    pub fn start(&self) {
        let mut timer = self.inner.timer();
        timer.deadline = Some(Instant::now() + self.inner.window);
        if timer.handle.is_some() {
            debug!(component = %self.inner.component, "heartbeat deadline re-armed");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_deadline_loop(self.inner.clone(), shutdown_rx));
        timer.shutdown = Some(shutdown_tx);
        timer.handle = Some(handle);
        info!(
            component = %self.inner.component,
            window_secs = self.inner.window.as_secs(),
            "heartbeat monitor started"
        );
    }

    /// Record liveness without a report. Does nothing once stopped.
    pub fn touch(&self) {
        let mut timer = self.inner.timer();
        if timer.deadline.is_none() {
            return;
        }
        timer.deadline = Some(Instant::now() + self.inner.window);
        if timer.liveness == Liveness::Degraded {
            info!(component = %self.inner.component, "heartbeat resumed");
        }
        timer.liveness = Liveness::Healthy;
    }

    /// Handle a report: re-arm first, then classify its status.
    ///
    /// An unrecognized status is a `Validation` error for the sender but
    /// still counts as liveness.
    pub fn signal(&self, report: &HeartbeatReport) -> Result<()> {
        self.touch();

        let component = &self.inner.component;
        match report.status.as_str() {
            "ok" => {
                self.inner.health.set(
                    component,
                    HealthStatus::Ok,
                    format!("Director timestamp: {}", report.timestamp),
                );
                self.inner.metrics.heartbeats.ok.inc();
                debug!(component = %component, timestamp = %report.timestamp, "director test ok");
                Ok(())
            }
            "error" => {
                self.inner
                    .health
                    .set(component, HealthStatus::Critical, report.message.clone());
                self.inner.metrics.heartbeats.error.inc();
                warn!(component = %component, message = %report.message, "director test reported error");
                Ok(())
            }
            other => {
                self.inner.metrics.heartbeats.invalid.inc();
                Err(Error::Validation(format!(
                    "Invalid director test response status: {}",
                    other
                )))
            }
        }
    }

    pub fn liveness(&self) -> Liveness {
        self.inner.timer().liveness
    }

    pub fn is_running(&self) -> bool {
        self.inner.timer().handle.is_some()
    }

    /// Number of missed windows since creation
    pub fn expiries(&self) -> u64 {
        self.inner.metrics.heartbeats.expiries.get()
    }

    /// Cancel the deadline and wait for the loop to exit.
    pub async fn stop(&self) {
        let (shutdown, handle) = {
            let mut timer = self.inner.timer();
            timer.deadline = None;
            (timer.shutdown.take(), timer.handle.take())
        };
        if let Some(tx) = shutdown {
            let _ = tx.send(true);
        }
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(component = %self.inner.component, error = %e, "heartbeat loop ended abnormally");
            }
            info!(component = %self.inner.component, "heartbeat monitor stopped");
        }
    }
}

impl Drop for HeartbeatDeadlineMonitor {
    fn drop(&mut self) {
        let mut timer = self.inner.timer();
        timer.deadline = None;
        if let Some(tx) = timer.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = timer.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(30);

    fn monitor() -> (HeartbeatDeadlineMonitor, Arc<HealthRegistry>) {
        let health = Arc::new(HealthRegistry::new());
        let monitor = HeartbeatDeadlineMonitor::new(
            DIRECTOR_COMPONENT,
            WINDOW,
            health.clone(),
            Arc::new(Metrics::new()),
        );
        (monitor, health)
    }

    fn report(status: &str) -> HeartbeatReport {
        HeartbeatReport {
            status: status.to_string(),
            message: "director test message".to_string(),
            timestamp: "1700000000".to_string(),
        }
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_rearms_every_window() {
        let (monitor, health) = monitor();
        monitor.start();

        advance(29).await;
        assert_eq!(monitor.expiries(), 0);
        assert_eq!(health.status_of(DIRECTOR_COMPONENT), HealthStatus::Unknown);

        advance(2).await;
        assert_eq!(monitor.expiries(), 1);
        assert_eq!(health.status_of(DIRECTOR_COMPONENT), HealthStatus::Critical);
        assert_eq!(monitor.liveness(), Liveness::Degraded);

        advance(30).await;
        assert_eq!(monitor.expiries(), 2);
        advance(30).await;
        assert_eq!(monitor.expiries(), 3);

        // t=91: a report stops the recurrence until the next missed window
        monitor.signal(&report("ok")).unwrap();
        assert_eq!(health.status_of(DIRECTOR_COMPONENT), HealthStatus::Ok);
        assert_eq!(monitor.liveness(), Liveness::Healthy);
        advance(29).await;
        assert_eq!(monitor.expiries(), 3);
        advance(2).await;
        assert_eq!(monitor.expiries(), 4);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_status_still_counts_as_liveness() {
        let (monitor, health) = monitor();
        monitor.start();

        advance(20).await;
        let err = monitor.signal(&report("bogus")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // The original deadline (t=30) has passed without an expiry.
        advance(20).await;
        assert_eq!(monitor.expiries(), 0);
        assert_eq!(health.status_of(DIRECTOR_COMPONENT), HealthStatus::Unknown);

        advance(11).await;
        assert_eq!(monitor.expiries(), 1);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_report_degrades_health_not_liveness() {
        let (monitor, health) = monitor();
        monitor.start();

        monitor.signal(&report("error")).unwrap();
        let entry = health.get(DIRECTOR_COMPONENT).unwrap();
        assert_eq!(entry.status, HealthStatus::Critical);
        assert_eq!(entry.message, "director test message");
        assert_eq!(monitor.liveness(), Liveness::Healthy);

        advance(29).await;
        assert_eq!(monitor.expiries(), 0);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ok_report_message_carries_timestamp() {
        let (monitor, health) = monitor();
        monitor.start();
        monitor.signal(&report("ok")).unwrap();
        assert_eq!(
            health.get(DIRECTOR_COMPONENT).unwrap().message,
            "Director timestamp: 1700000000"
        );
        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_only_rearms() {
        let (monitor, _) = monitor();
        monitor.start();
        advance(20).await;
        monitor.start();
        assert!(monitor.is_running());

        advance(20).await;
        assert_eq!(monitor.expiries(), 0);
        advance(11).await;
        assert_eq!(monitor.expiries(), 1);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_loop() {
        let (monitor, health) = monitor();
        monitor.start();
        advance(10).await;
        monitor.stop().await;
        assert!(!monitor.is_running());

        advance(300).await;
        assert_eq!(monitor.expiries(), 0);

        // Reports after stop are still classified but do not re-arm.
        monitor.signal(&report("ok")).unwrap();
        assert_eq!(health.status_of(DIRECTOR_COMPONENT), HealthStatus::Ok);
        advance(300).await;
        assert_eq!(monitor.expiries(), 0);

        // A second stop is a no-op.
        monitor.stop().await;
    }

    #[test]
    fn test_report_decoding() {
        let r: HeartbeatReport =
            serde_json::from_str(r#"{"status":"ok","message":"m","timestamp":"12"}"#).unwrap();
        assert_eq!(r.status, "ok");
        assert_eq!(r.timestamp, "12");

        let r: HeartbeatReport = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert_eq!(r.message, "");
    }
}
