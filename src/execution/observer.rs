use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::types::JobId;

/// Why an execution unit was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The unit replied (or crashed) and has served its single request.
    Completed,
    /// A newer submission replaced the unit while it was still running.
    Superseded,
    /// The coordinator was reset while the unit was still running.
    Reset,
}

/// Execution events emitted by the coordinator.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    UnitSpawned { job: JobId },
    FileDispatched { job: JobId, source: String },
    ResponseReceived { job: JobId, success: bool, elapsed: Duration },
    UnitCrashed { job: JobId, detail: String },
    UnitTerminated { job: JobId, reason: TerminationReason },
    StaleResponseDropped { job: JobId, active: Option<JobId> },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Forwards execution events to `tracing` at debug level (warn for crashes).
#[derive(Debug, Default)]
pub struct TracingExecutionObserver;

impl ExecutionObserver for TracingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::UnitCrashed { job, detail } => {
                tracing::warn!(target: "ingest::execution", %job, %detail, "execution unit crashed");
            }
            other => tracing::debug!(target: "ingest::execution", event = ?other),
        }
    }
}

/// Running counters for a coordinator's execution units.
///
/// The coordinator updates these as it goes; callers can snapshot them at any time.
pub struct ExecutionMetrics {
    submissions: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    crashes: AtomicU64,
    superseded: AtomicU64,
    stale_dropped: AtomicU64,

    active_units: AtomicUsize,
    max_active_units: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            submissions: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            crashes: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
            stale_dropped: AtomicU64::new(0),
            active_units: AtomicUsize::new(0),
            max_active_units: AtomicUsize::new(0),
        }
    }

    pub fn on_submit(&self) {
        let _ = self.submissions.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_unit_spawned(&self) {
        let now = self.active_units.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_units, now);
    }

    pub fn on_unit_terminated(&self) {
        let _ = self.active_units.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_success(&self) {
        let _ = self.successes.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_failure(&self) {
        let _ = self.failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_crash(&self) {
        let _ = self.crashes.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_superseded(&self) {
        let _ = self.superseded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_stale_dropped(&self) {
        let _ = self.stale_dropped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        ExecutionMetricsSnapshot {
            submissions: self.submissions.load(Ordering::SeqCst),
            successes: self.successes.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
            crashes: self.crashes.load(Ordering::SeqCst),
            superseded: self.superseded.load(Ordering::SeqCst),
            stale_dropped: self.stale_dropped.load(Ordering::SeqCst),
            active_units: self.active_units.load(Ordering::SeqCst),
            max_active_units: self.max_active_units.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    loop {
        let cur = dst.load(Ordering::SeqCst);
        if now <= cur {
            break;
        }
        if dst
            .compare_exchange(cur, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub submissions: u64,
    pub successes: u64,
    /// Decode and structural failures reported by a unit.
    pub failures: u64,
    /// Units that failed to start or died without a reply.
    pub crashes: u64,
    pub superseded: u64,
    pub stale_dropped: u64,
    pub active_units: usize,
    pub max_active_units: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submissions={}, ok={}, failed={}, crashed={}, superseded={}, stale_dropped={}, active_units={}/{}",
            self.submissions,
            self.successes,
            self.failures,
            self.crashes,
            self.superseded,
            self.stale_dropped,
            self.active_units,
            self.max_active_units
        )
    }
}
