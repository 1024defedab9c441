//! The ingestion coordinator: one in-flight job, replace-or-reset cancellation.
//!
//! ```text
//! Idle --submit--> Loading --ok--> Success
//!                  Loading --err--> Error
//! Success|Error|Loading --submit--> Loading   (previous unit torn down first)
//! Success|Error|Loading --reset--> Idle
//! ```
//!
//! All state lives on the caller's thread. The only work that runs elsewhere is the decode on the
//! active [`ExecutionUnit`]; its reply is applied by [`IngestionCoordinator::poll`],
//! [`IngestionCoordinator::wait`] or [`IngestionCoordinator::wait_timeout`].

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::IngestionError;
use crate::execution::{
    ExecutionEvent, ExecutionMetrics, ExecutionObserver, ExecutionOptions, ExecutionUnit, TerminationReason,
    UnitOutcome, UnitReply, WorkerMessage,
};
use crate::grid::{project_with, Grid, ProjectionOptions};
use crate::ingestion::unified::report_failure;
use crate::ingestion::{IngestionContext, IngestionOptions, SourceFile, TabularDecoder};
use crate::types::{Dataset, JobId};

/// Externally observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// The phase/dataset/error triple, plus which job it describes.
///
/// `dataset` is present only in [`Phase::Success`] and `error_message` only in [`Phase::Error`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestionState {
    phase: Phase,
    dataset: Option<Dataset>,
    error_message: Option<String>,
    job: Option<JobId>,
    source: Option<String>,
}

impl IngestionState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The latest submission, if any since the last reset.
    pub fn job(&self) -> Option<JobId> {
        self.job
    }

    /// Display name of the latest submitted file.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }
}

/// Configuration for [`IngestionCoordinator`].
#[derive(Debug, Clone, Default)]
pub struct CoordinatorOptions {
    /// Decode options shipped to every execution unit.
    pub ingestion: IngestionOptions,
    /// Execution unit thread settings.
    pub execution: ExecutionOptions,
    /// Grid projection settings used by [`IngestionCoordinator::grid`].
    pub projection: ProjectionOptions,
}

/// Owns the request/response lifecycle with the execution unit.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use rust_grid_ingest::coordinator::{CoordinatorOptions, IngestionCoordinator, Phase};
/// use rust_grid_ingest::ingestion::{SourceFile, WorkbookDecoder};
///
/// let mut coordinator = IngestionCoordinator::new(Arc::new(WorkbookDecoder::new()), CoordinatorOptions::default());
/// coordinator.submit(SourceFile::from_path("people.xlsx"));
///
/// match coordinator.wait() {
///     Phase::Success => println!("{} cells", coordinator.grid().map_or(0, |g| g.len())),
///     _ => println!("{}", coordinator.error_message().unwrap_or_default()),
/// }
/// ```
pub struct IngestionCoordinator {
    decoder: Arc<dyn TabularDecoder>,
    opts: CoordinatorOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
    state: IngestionState,
    active: Option<ExecutionUnit>,
    next_job: u64,
    replies_tx: Sender<UnitReply>,
    replies_rx: Receiver<UnitReply>,
}

impl IngestionCoordinator {
    /// Create an idle coordinator that decodes with `decoder`.
    pub fn new(decoder: Arc<dyn TabularDecoder>, opts: CoordinatorOptions) -> Self {
        let (replies_tx, replies_rx) = mpsc::channel();
        Self {
            decoder,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
            state: IngestionState::default(),
            active: None,
            next_job: 1,
            replies_tx,
            replies_rx,
        }
    }

    /// Attach an observer for execution events.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to the execution counters.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn state(&self) -> &IngestionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.state.dataset()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.state.error_message()
    }

    /// The job whose reply is currently awaited.
    pub fn active_job(&self) -> Option<JobId> {
        self.active.as_ref().map(ExecutionUnit::job)
    }

    /// Fresh projection of the current dataset; `None` unless the phase is [`Phase::Success`].
    pub fn grid(&self) -> Option<Grid> {
        match (&self.state.phase, &self.state.dataset) {
            (Phase::Success, Some(ds)) => Some(project_with(ds, &self.opts.projection)),
            _ => None,
        }
    }

    /// Submit `file`, replacing whatever was there before.
    ///
    /// The phase becomes [`Phase::Loading`] immediately and the previous dataset/error are
    /// cleared. A unit still working on an earlier submission is torn down before the new one is
    /// spawned; its result will never be observable.
    pub fn submit(&mut self, file: SourceFile) -> JobId {
        self.teardown(TerminationReason::Superseded);

        let job = JobId(self.next_job);
        self.next_job += 1;
        self.state = IngestionState {
            phase: Phase::Loading,
            dataset: None,
            error_message: None,
            job: Some(job),
            source: Some(file.name().to_owned()),
        };
        self.metrics.on_submit();
        tracing::debug!(%job, source = %file.name(), "submit");

        let spawned = ExecutionUnit::spawn(
            job,
            Arc::clone(&self.decoder),
            self.opts.ingestion.clone(),
            &self.opts.execution,
            self.replies_tx.clone(),
        );
        let mut unit = match spawned {
            Ok(unit) => unit,
            Err(err) => {
                self.fail_execution(job, err);
                return job;
            }
        };
        self.metrics.on_unit_spawned();
        self.emit(ExecutionEvent::UnitSpawned { job });

        let source = file.name().to_owned();
        if let Err(err) = unit.post(file) {
            self.active = Some(unit);
            self.teardown(TerminationReason::Completed);
            self.fail_execution(job, err);
            return job;
        }
        self.emit(ExecutionEvent::FileDispatched { job, source });
        self.active = Some(unit);
        job
    }

    /// Drop the dataset and error, return to [`Phase::Idle`] and tear down any active unit.
    pub fn reset(&mut self) {
        self.teardown(TerminationReason::Reset);
        self.state = IngestionState::default();
        tracing::debug!("reset");
    }

    /// Apply any reply that is already available. Never blocks.
    ///
    /// Returns `true` if the state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.replies_rx.try_recv() {
                Ok(reply) => changed |= self.handle_reply(reply),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if !changed {
            changed = self.check_liveness();
        }
        changed
    }

    /// Block until the active job resolves and return the resulting phase.
    ///
    /// Returns immediately when nothing is loading. There is no timeout: a decoder that never
    /// returns keeps this call blocked.
    pub fn wait(&mut self) -> Phase {
        while self.state.phase == Phase::Loading {
            match self.replies_rx.recv_timeout(self.opts.execution.liveness_interval) {
                Ok(reply) => {
                    self.handle_reply(reply);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    self.check_liveness();
                }
            }
        }
        self.state.phase
    }

    /// Like [`Self::wait`], but gives up after `timeout` and returns the phase at that point
    /// (still [`Phase::Loading`] if the job has not resolved). The job keeps running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Phase {
        let deadline = Instant::now() + timeout;
        while self.state.phase == Phase::Loading {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = (deadline - now).min(self.opts.execution.liveness_interval);
            match self.replies_rx.recv_timeout(slice) {
                Ok(reply) => {
                    self.handle_reply(reply);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    self.check_liveness();
                }
            }
        }
        self.state.phase
    }

    fn handle_reply(&mut self, reply: UnitReply) -> bool {
        let active = self.active_job();
        if active != Some(reply.job) {
            self.metrics.on_stale_dropped();
            tracing::debug!(job = %reply.job, ?active, "dropping stale reply");
            self.emit(ExecutionEvent::StaleResponseDropped {
                job: reply.job,
                active,
            });
            return false;
        }

        let elapsed = self
            .active
            .as_ref()
            .map(|u| u.started_at().elapsed())
            .unwrap_or_default();
        let job = reply.job;

        match reply.outcome {
            UnitOutcome::Message(WorkerMessage::Success(dataset)) => {
                self.emit(ExecutionEvent::ResponseReceived {
                    job,
                    success: true,
                    elapsed,
                });
                self.teardown(TerminationReason::Completed);
                self.metrics.on_success();
                self.state.phase = Phase::Success;
                self.state.dataset = Some(dataset);
                self.state.error_message = None;
            }
            UnitOutcome::Message(WorkerMessage::Error(message)) => {
                self.emit(ExecutionEvent::ResponseReceived {
                    job,
                    success: false,
                    elapsed,
                });
                self.teardown(TerminationReason::Completed);
                self.metrics.on_failure();
                self.set_error(format!("Error processing file: {message}"));
            }
            UnitOutcome::Fault(detail) => {
                self.emit(ExecutionEvent::UnitCrashed {
                    job,
                    detail: detail.clone(),
                });
                self.teardown(TerminationReason::Completed);
                self.fail_execution(job, IngestionError::WorkerCrashed { detail });
            }
        }
        true
    }

    // A unit whose thread is gone without a queued reply will never answer.
    fn check_liveness(&mut self) -> bool {
        let finished = match &self.active {
            Some(unit) => unit.is_finished(),
            None => return false,
        };
        if !finished {
            return false;
        }

        // The reply, if any, was queued before the thread exited.
        let mut changed = false;
        while let Ok(reply) = self.replies_rx.try_recv() {
            changed |= self.handle_reply(reply);
        }
        if let Some(job) = self.active_job() {
            let detail = "the execution unit exited without a response".to_string();
            self.emit(ExecutionEvent::UnitCrashed {
                job,
                detail: detail.clone(),
            });
            self.teardown(TerminationReason::Completed);
            self.fail_execution(job, IngestionError::WorkerCrashed { detail });
            changed = true;
        }
        changed
    }

    fn fail_execution(&mut self, job: JobId, err: IngestionError) {
        self.metrics.on_crash();
        tracing::warn!(%job, err = %err, "execution unit failure");
        if let Some(obs) = self.opts.ingestion.observer.as_ref() {
            let ctx = IngestionContext {
                job,
                source: self.state.source.clone().unwrap_or_default(),
                format: self.opts.ingestion.format,
            };
            report_failure(obs.as_ref(), &ctx, self.opts.ingestion.alert_at_or_above, &err);
        }
        self.set_error(err.to_string());
    }

    fn set_error(&mut self, message: String) {
        self.state.phase = Phase::Error;
        self.state.dataset = None;
        self.state.error_message = Some(message);
    }

    fn teardown(&mut self, reason: TerminationReason) {
        if let Some(unit) = self.active.take() {
            let job = unit.job();
            unit.terminate();
            self.metrics.on_unit_terminated();
            if reason == TerminationReason::Superseded {
                self.metrics.on_superseded();
            }
            self.emit(ExecutionEvent::UnitTerminated { job, reason });
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

impl Drop for IngestionCoordinator {
    fn drop(&mut self) {
        self.teardown(TerminationReason::Reset);
    }
}

impl fmt::Debug for IngestionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionCoordinator")
            .field("state", &self.state)
            .field("active_job", &self.active_job())
            .field("observer_set", &self.observer.is_some())
            .field("opts", &self.opts)
            .finish()
    }
}
