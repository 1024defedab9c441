use std::sync::{Arc, Mutex};

use rust_grid_ingest::coordinator::{CoordinatorOptions, IngestionCoordinator, Phase};
use rust_grid_ingest::execution::{ExecutionEvent, ExecutionObserver, TerminationReason};
use rust_grid_ingest::ingestion::{
    ingest_source, CompositeObserver, IngestionContext, IngestionObserver, IngestionOptions, IngestionSeverity,
    IngestionStats, SourceFile, WorkbookDecoder,
};
use rust_grid_ingest::IngestionError;

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<IngestionStats>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_success(&self, _ctx: &IngestionContext, stats: IngestionStats) {
        self.successes.lock().unwrap().push(stats);
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl ExecutionObserver for EventLog {
    fn on_event(&self, event: &ExecutionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[test]
fn observer_receives_failure_and_alert_on_unreadable_file() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestionOptions {
        observer: Some(obs.clone()),
        alert_at_or_above: IngestionSeverity::Critical,
        ..Default::default()
    };

    // Missing file -> Unreadable -> Critical
    let _ = ingest_source(
        &WorkbookDecoder::new(),
        &SourceFile::from_path("tests/fixtures/does_not_exist.csv"),
        &opts,
    )
    .unwrap_err();

    let failures = obs.failures.lock().unwrap().clone();
    let alerts = obs.alerts.lock().unwrap().clone();
    assert_eq!(failures, vec![IngestionSeverity::Critical]);
    assert_eq!(alerts, vec![IngestionSeverity::Critical]);
}

#[test]
fn observer_receives_failure_without_alert_for_empty_result() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestionOptions {
        observer: Some(obs.clone()),
        ..Default::default()
    };

    let _ = ingest_source(
        &WorkbookDecoder::new(),
        &SourceFile::from_path("tests/fixtures/header_only.csv"),
        &opts,
    )
    .unwrap_err();

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![IngestionSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn composite_observer_fans_out_success_stats() {
    let a = Arc::new(RecordingObserver::default());
    let b = Arc::new(RecordingObserver::default());
    let composite = CompositeObserver::new(vec![a.clone() as Arc<dyn IngestionObserver>, b.clone()]);
    let opts = IngestionOptions {
        observer: Some(Arc::new(composite)),
        ..Default::default()
    };

    ingest_source(
        &WorkbookDecoder::new(),
        &SourceFile::from_path("tests/fixtures/people.csv"),
        &opts,
    )
    .unwrap();

    let expected = vec![IngestionStats { rows: 3, columns: 2 }];
    assert_eq!(a.successes.lock().unwrap().clone(), expected);
    assert_eq!(b.successes.lock().unwrap().clone(), expected);
}

#[test]
fn coordinator_reports_unit_lifecycle_events() {
    let log = Arc::new(EventLog::default());
    let mut coordinator = IngestionCoordinator::new(Arc::new(WorkbookDecoder::new()), CoordinatorOptions::default())
        .with_observer(log.clone());

    let job = coordinator.submit(SourceFile::from_path("tests/fixtures/people.csv"));
    assert_eq!(coordinator.wait(), Phase::Success);

    let events = log.events.lock().unwrap().clone();
    assert!(matches!(events[0], ExecutionEvent::UnitSpawned { job: j } if j == job));
    assert!(matches!(events[1], ExecutionEvent::FileDispatched { job: j, .. } if j == job));
    assert!(matches!(
        events[2],
        ExecutionEvent::ResponseReceived { job: j, success: true, .. } if j == job
    ));
    assert!(matches!(
        events[3],
        ExecutionEvent::UnitTerminated { job: j, reason: TerminationReason::Completed } if j == job
    ));
}

#[test]
fn coordinator_forwards_ingestion_observer_to_units() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = CoordinatorOptions {
        ingestion: IngestionOptions {
            observer: Some(obs.clone()),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut coordinator = IngestionCoordinator::new(Arc::new(WorkbookDecoder::new()), opts);

    coordinator.submit(SourceFile::from_path("tests/fixtures/people.csv"));
    assert_eq!(coordinator.wait(), Phase::Success);
    assert_eq!(obs.successes.lock().unwrap().len(), 1);
}
