//! The isolated, single-use execution unit.
//!
//! Protocol: the unit is spawned, receives exactly one [`SourceFile`] through [`ExecutionUnit::post`]
//! and answers exactly once on the shared reply channel with a [`UnitReply`] tagged by its
//! [`JobId`]. A panic inside the decoder is caught on the unit's thread and reported as
//! [`UnitOutcome::Fault`] instead of a [`WorkerMessage`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::{IngestionOptions, IngestionRequest, SourceFile, TabularDecoder};
use crate::types::{Dataset, JobId};

use super::ExecutionOptions;

/// The message a unit sends after handling its file.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    /// Decoding succeeded with at least one record.
    Success(Dataset),
    /// Decoding failed; the payload is the user-facing reason.
    Error(String),
}

/// What came back from a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    /// A protocol message.
    Message(WorkerMessage),
    /// The unit itself failed (transport-level error); the payload describes the failure.
    Fault(String),
}

/// A unit's reply, tagged with the submission it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitReply {
    pub job: JobId,
    pub outcome: UnitOutcome,
}

/// Handle to one running execution unit.
///
/// Dropping the handle has the same effect as [`ExecutionUnit::terminate`].
pub struct ExecutionUnit {
    job: JobId,
    inbox: Option<Sender<SourceFile>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    started_at: Instant,
}

impl ExecutionUnit {
    /// Start a unit for `job` on a dedicated, named thread.
    ///
    /// The unit idles until [`Self::post`] hands it a file. Its reply goes to `replies`.
    /// Fails with [`IngestionError::WorkerStart`] if the thread cannot be created.
    pub fn spawn(
        job: JobId,
        decoder: Arc<dyn TabularDecoder>,
        ingestion: IngestionOptions,
        opts: &ExecutionOptions,
        replies: Sender<UnitReply>,
    ) -> IngestionResult<Self> {
        Self::spawn_with(job, opts, move |inbox, cancelled| {
            run_unit(job, decoder, ingestion, inbox, cancelled, replies)
        })
    }

    // Starts `body` on the unit thread with the inbox and the cancel flag.
    pub(crate) fn spawn_with<F>(job: JobId, opts: &ExecutionOptions, body: F) -> IngestionResult<Self>
    where
        F: FnOnce(Receiver<SourceFile>, Arc<AtomicBool>) + Send + 'static,
    {
        let (inbox_tx, inbox_rx) = mpsc::channel::<SourceFile>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let mut builder = thread::Builder::new().name(format!("{}-{}", opts.thread_name_prefix, job.0));
        if let Some(size) = opts.stack_size {
            builder = builder.stack_size(size);
        }

        let handle = builder
            .spawn(move || body(inbox_rx, flag))
            .map_err(|source| IngestionError::WorkerStart { source })?;

        Ok(Self {
            job,
            inbox: Some(inbox_tx),
            cancelled,
            handle: Some(handle),
            started_at: Instant::now(),
        })
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    /// When the unit was spawned.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Send the unit its single input message.
    pub fn post(&mut self, file: SourceFile) -> IngestionResult<()> {
        let inbox = self.inbox.take().ok_or_else(|| IngestionError::WorkerProtocol {
            message: format!("{} already received its file", self.job),
        })?;
        inbox.send(file).map_err(|_| IngestionError::WorkerCrashed {
            detail: "the execution unit exited before receiving the file".to_string(),
        })
    }

    /// Returns `true` once the unit's thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Tear the unit down. Whatever it produces afterwards is never sent.
    ///
    /// There is no way to interrupt a decode in progress; the thread is detached and exits on its
    /// own once the decoder returns.
    pub fn terminate(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.inbox = None;
        self.handle = None;
    }
}

impl Drop for ExecutionUnit {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_unit(
    job: JobId,
    decoder: Arc<dyn TabularDecoder>,
    ingestion: IngestionOptions,
    inbox: Receiver<SourceFile>,
    cancelled: Arc<AtomicBool>,
    replies: Sender<UnitReply>,
) {
    // Torn down before the file arrived.
    let Ok(source) = inbox.recv() else {
        return;
    };
    if cancelled.load(Ordering::SeqCst) {
        return;
    }

    let request = IngestionRequest {
        job,
        source,
        options: ingestion,
    };
    let decoded = panic::catch_unwind(AssertUnwindSafe(|| request.decode(decoder.as_ref())));

    // Checked before the observer hears anything, so a replaced job stays silent.
    if cancelled.load(Ordering::SeqCst) {
        tracing::debug!(%job, "discarding result of a terminated unit");
        return;
    }

    let outcome = match decoded {
        Ok((ctx, result)) => {
            request.report(&ctx, &result);
            match result {
                Ok(dataset) => UnitOutcome::Message(WorkerMessage::Success(dataset)),
                Err(err) => UnitOutcome::Message(WorkerMessage::Error(err.to_string())),
            }
        }
        Err(payload) => UnitOutcome::Fault(panic_detail(payload.as_ref())),
    };
    let _ = replies.send(UnitReply { job, outcome });
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "the execution unit panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    use super::{ExecutionUnit, UnitOutcome, WorkerMessage};
    use crate::error::{IngestionError, IngestionResult};
    use crate::execution::ExecutionOptions;
    use crate::ingestion::{IngestionOptions, SourceFile, SourceFormat, Table, TabularDecoder, WorkbookDecoder};
    use crate::types::JobId;

    struct PanickingDecoder;

    impl TabularDecoder for PanickingDecoder {
        fn read_tables(&self, _content: &[u8], _format: SourceFormat) -> IngestionResult<Vec<Table>> {
            panic!("decoder exploded");
        }
    }

    fn spawn(decoder: Arc<dyn TabularDecoder>, job: u64) -> (ExecutionUnit, mpsc::Receiver<super::UnitReply>) {
        let (tx, rx) = mpsc::channel();
        let unit = ExecutionUnit::spawn(
            JobId(job),
            decoder,
            IngestionOptions::default(),
            &ExecutionOptions::default(),
            tx,
        )
        .unwrap();
        (unit, rx)
    }

    #[test]
    fn unit_replies_once_with_its_job_id() {
        let (mut unit, rx) = spawn(Arc::new(WorkbookDecoder::new()), 7);
        unit.post(SourceFile::from_bytes("a.csv", "x,y\n1,2\n")).unwrap();

        let reply = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(reply.job, JobId(7));
        match reply.outcome {
            UnitOutcome::Message(WorkerMessage::Success(ds)) => assert_eq!(ds.row_count(), 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        unit.terminate();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn second_post_is_rejected() {
        let (mut unit, _rx) = spawn(Arc::new(WorkbookDecoder::new()), 1);
        unit.post(SourceFile::from_bytes("a.csv", "x\n1\n")).unwrap();
        let err = unit.post(SourceFile::from_bytes("b.csv", "x\n1\n")).unwrap_err();
        assert!(matches!(err, IngestionError::WorkerProtocol { .. }));
    }

    #[test]
    fn decoder_panic_becomes_fault() {
        let (mut unit, rx) = spawn(Arc::new(PanickingDecoder), 3);
        unit.post(SourceFile::from_bytes("a.csv", "x\n1\n")).unwrap();

        let reply = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(reply.outcome, UnitOutcome::Fault("decoder exploded".to_string()));
    }

    #[test]
    fn terminated_before_post_never_replies() {
        let (unit, rx) = spawn(Arc::new(WorkbookDecoder::new()), 9);
        unit.terminate();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
