//! Error types for the controller side of the worker handoff.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single channel file operation.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to post '{name}': {source}")]
    Write {
        name: String,
        source: std::io::Error,
    },
    #[error("failed to remove '{name}': {source}")]
    Remove {
        name: String,
        source: std::io::Error,
    },
    #[error("failed to read '{name}': {source}")]
    Read {
        name: String,
        source: std::io::Error,
    },
    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Process start, inspection and kill failures. During cleanup these are
/// logged and dropped; only a failed worker launch reaches the caller.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("failed to kill process {pid}: {reason}")]
    Kill { pid: u32, reason: String },
    #[error("failed to inspect process {pid}: {reason}")]
    Inspect { pid: u32, reason: String },
    #[error("failed to list processes: {reason}")]
    ProcessTable { reason: String },
}

/// Why a job (or the session around it) could not produce an outcome.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),
    #[error("audio preprocessing failed: {0}")]
    PreprocessingFailed(String),
    #[error("worker reported a failure{}", .0.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    JobFailed(Option<String>),
    #[error("timed out after {waited:?} waiting for {rendezvous}")]
    Timeout {
        rendezvous: String,
        waited: Duration,
    },
    #[error("cancelled while waiting for {rendezvous}")]
    Cancelled { rendezvous: String },
    #[error("worker process exited ({0})")]
    WorkerExited(String),
    #[error("session is closed")]
    SessionClosed,
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl JobError {
    /// Errors after which the worker's state is unknown and the session
    /// has to be torn down.
    pub fn poisons_session(&self) -> bool {
        matches!(
            self,
            JobError::Timeout { .. } | JobError::Cancelled { .. } | JobError::WorkerExited(_)
        )
    }
}
