#![cfg(unix)]

mod common;

use std::path::Path;

use common::{source_file, CopyPreprocessor, FakeWorker};
use fast_stt::config::{AppConfig, ReaperConfig, TimingConfig, WorkerConfig};
use fast_stt::types::{ComputeType, Device, JobParameters};
use fast_stt::{Controller, JobError, JobOutcome, JobPhase, Message};
use tokio_util::sync::CancellationToken;

/// A config whose worker is a shell that only signals readiness. Jobs are
/// answered by an in-process [`FakeWorker`]. Reaping is off so the test
/// never touches unrelated processes.
fn config(dir: &Path, script: &str) -> AppConfig {
    AppConfig {
        runtime_dir: dir.join("runtime"),
        staging_dir: dir.to_path_buf(),
        log_dir: dir.join("logs"),
        worker: WorkerConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        },
        reaper: ReaperConfig {
            enabled: false,
            ..ReaperConfig::default()
        },
        timing: TimingConfig {
            poll_interval_ms: 2,
            startup_timeout_secs: 10,
            preprocess_timeout_secs: 10,
            job_timeout_secs: 10,
            consume_timeout_secs: 5,
        },
        ..AppConfig::default()
    }
}

fn params() -> JobParameters {
    JobParameters::new("small", Device::Cpu, ComputeType::Float32)
}

#[test]
fn test_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "touch ready_to_transcribe.txt; sleep 60");
    let cancel = CancellationToken::new();

    let mut controller =
        Controller::start_session_with(&config, Box::new(CopyPreprocessor::default()), &cancel)
            .unwrap();
    assert!(controller.worker_alive());
    assert_eq!(controller.phase(), JobPhase::Idle);
    assert!(!config.runtime_dir.join(Message::Ready.file_name()).exists());

    let _worker = FakeWorker::spawn(&config.runtime_dir);
    let dest = dir.path().join("out.txt");
    let outcome = controller
        .submit_job(&source_file(dir.path()), &dest, &params(), &cancel)
        .unwrap();
    assert_eq!(outcome, JobOutcome::Completed(dest));

    controller.end_session();
    controller.end_session();
    assert!(!controller.is_open());
    assert!(!controller.worker_alive());

    let err = controller
        .submit_job(&source_file(dir.path()), &dir.path().join("again.txt"), &params(), &cancel)
        .unwrap_err();
    assert!(matches!(err, JobError::SessionClosed));
}

#[test]
fn test_missing_input_keeps_session_open() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "touch ready_to_transcribe.txt; sleep 60");
    let cancel = CancellationToken::new();

    let mut controller =
        Controller::start_session_with(&config, Box::new(CopyPreprocessor::default()), &cancel)
            .unwrap();
    let err = controller
        .submit_job(&dir.path().join("nope.wav"), &dir.path().join("out.txt"), &params(), &cancel)
        .unwrap_err();

    assert!(matches!(err, JobError::InputNotFound(_)));
    assert!(controller.is_open());
    assert!(controller.worker_alive());
}

#[test]
fn test_worker_exit_ends_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "touch ready_to_transcribe.txt; exit 0");
    let cancel = CancellationToken::new();

    let mut controller =
        Controller::start_session_with(&config, Box::new(CopyPreprocessor::default()), &cancel)
            .unwrap();
    let err = controller
        .submit_job(&source_file(dir.path()), &dir.path().join("out.txt"), &params(), &cancel)
        .unwrap_err();

    assert!(matches!(err, JobError::WorkerExited(_)));
    assert!(!controller.is_open());
    let leftovers = std::fs::read_dir(&config.runtime_dir).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_cancelled_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "sleep 60");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Controller::start_session_with(&config, Box::new(CopyPreprocessor::default()), &cancel)
        .err()
        .unwrap();
    assert!(matches!(err, JobError::Cancelled { .. }));
}
