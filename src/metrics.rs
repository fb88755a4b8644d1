// Runtime metrics module
//
// Lightweight counters for the shell's coordination paths, logged on shutdown

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shell runtime metrics
///
/// Uses relaxed atomics so that the engine thread, load workers and the
/// control thread can all record without locking.
#[derive(Debug)]
pub struct Metrics {
    /// Engine notifications received by the dispatcher
    pub notifications_dispatched: AtomicU64,

    /// Notification handlers that returned an error or panicked
    pub handler_failures: AtomicU64,

    /// Tasks executed from the control queue
    pub control_tasks_run: AtomicU64,

    /// Control queue tasks that failed
    pub control_tasks_failed: AtomicU64,

    pub loads_started: AtomicU64,
    pub loads_completed: AtomicU64,
    pub loads_failed: AtomicU64,

    /// Menu projection ticks that published a snapshot
    pub projection_ticks: AtomicU64,

    /// Menu projection ticks abandoned after a query failure
    pub projection_aborts: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            notifications_dispatched: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            control_tasks_run: AtomicU64::new(0),
            control_tasks_failed: AtomicU64::new(0),
            loads_started: AtomicU64::new(0),
            loads_completed: AtomicU64::new(0),
            loads_failed: AtomicU64::new(0),
            projection_ticks: AtomicU64::new(0),
            projection_aborts: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_notification(&self) {
        self.notifications_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_control_task(&self, succeeded: bool) {
        self.control_tasks_run.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.control_tasks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_load_started(&self) {
        self.loads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_completed(&self) {
        self.loads_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failed(&self) {
        self.loads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_projection_tick(&self) {
        self.projection_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_projection_abort(&self) {
        self.projection_aborts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Loads queued but not yet finished
    pub fn loads_pending(&self) -> u64 {
        let started = self.loads_started.load(Ordering::Relaxed);
        let done = self.loads_completed.load(Ordering::Relaxed)
            + self.loads_failed.load(Ordering::Relaxed);
        started.saturating_sub(done)
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Shell Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Notifications: {} dispatched, {} handler failures",
            self.notifications_dispatched.load(Ordering::Relaxed),
            self.handler_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Control tasks: {} run, {} failed",
            self.control_tasks_run.load(Ordering::Relaxed),
            self.control_tasks_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Loads: {} started, {} completed, {} failed",
            self.loads_started.load(Ordering::Relaxed),
            self.loads_completed.load(Ordering::Relaxed),
            self.loads_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Menu projection: {} ticks, {} aborted",
            self.projection_ticks.load(Ordering::Relaxed),
            self.projection_aborts.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
