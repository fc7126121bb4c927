// ============================
// crates/security-lib/src/maintenance.rs
// ============================
//! Background sweeps.
//!
//! Every store also expires entries lazily on access; the sweeps only bound
//! memory. Each sweep runs on its own interval task and performs the same
//! atomic removals as the inline paths.
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::auth::SecurityService;

/// Entries removed by one pass of [`SecurityService::run_sweeps`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub csrf_tokens: usize,
    pub throttles: usize,
    pub devices: usize,
    pub permissions: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.sessions + self.csrf_tokens + self.throttles + self.devices + self.permissions
    }
}

/// Running sweep tasks; dropping the handle stops them
#[derive(Debug)]
pub struct MaintenanceHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Must be called from within a tokio runtime
    pub(crate) fn spawn(service: SecurityService, period: Duration) -> Self {
        info!(period_secs = period.as_secs(), "starting security maintenance tasks");

        let sessions = service.clone();
        let csrf = service.clone();
        let throttles = service.clone();
        let devices = service.clone();
        let permissions = service;

        let tasks = vec![
            spawn_sweeper("sessions", period, move || sessions.sweep_sessions()),
            spawn_sweeper("csrf", period, move || csrf.sweep_csrf()),
            spawn_sweeper("throttles", period, move || throttles.sweep_throttles()),
            spawn_sweeper("devices", period, move || devices.sweep_devices()),
            spawn_sweeper("permissions", period, move || {
                permissions.permissions().sweep_expired()
            }),
        ];

        Self { tasks }
    }

    /// Whether any sweep task is still alive
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn spawn_sweeper<F>(name: &'static str, period: Duration, sweep: F) -> JoinHandle<()>
where
    F: Fn() -> usize + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = sweep();
            if removed > 0 {
                debug!(sweeper = name, removed, "sweep removed stale entries");
            }
        }
    })
}
