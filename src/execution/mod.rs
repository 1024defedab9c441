//! Isolated execution of decode work.
//!
//! Each submission gets its own [`ExecutionUnit`]: a dedicated thread that decodes exactly one
//! file and replies exactly once. This module provides:
//!
//! - the unit and its message protocol ([`WorkerMessage`], [`UnitReply`])
//! - thread configuration ([`ExecutionOptions`])
//! - observer hooks and counters for monitoring ([`ExecutionObserver`], [`ExecutionMetrics`])

mod observer;
mod worker;

use std::time::Duration;

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver, TerminationReason,
    TracingExecutionObserver,
};
pub use worker::{ExecutionUnit, UnitOutcome, UnitReply, WorkerMessage};

/// Configuration for execution units.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Thread name prefix; the job number is appended (`ingest-worker-3`).
    pub thread_name_prefix: String,
    /// Stack size for unit threads. If `None`, uses the platform default.
    pub stack_size: Option<usize>,
    /// How often a blocked [`crate::coordinator::IngestionCoordinator::wait`] checks whether the
    /// active unit is still alive.
    pub liveness_interval: Duration,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            thread_name_prefix: "ingest-worker".to_string(),
            stack_size: None,
            liveness_interval: Duration::from_millis(100),
        }
    }
}
