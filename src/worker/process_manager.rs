//! Worker process lifecycle management.
//!
//! Spawns the worker hidden, in the channel directory, waits for its
//! readiness message, and kills it (and every stray instance) on shutdown.

use std::process::{Child, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use faststt_config::{ReaperConfig, WorkerConfig};
use tokio_util::sync::CancellationToken;

use super::reaper::{reap_stray_instances, ProcessTable, ReapReport, StrayMatcher, SystemProcessTable};
use super::WorkerLiveness;
use crate::command::{describe_exit, display_command, silent_command};
use crate::error::{JobError, SupervisorError};
use crate::ipc::wait::{wait_until, WaitPolicy};
use crate::ipc::{ControlChannel, Message};

/// Owns the worker child for one session.
pub struct ProcessSupervisor {
    child: Mutex<Option<Child>>,
    worker: WorkerConfig,
    reaper_enabled: bool,
    matcher: StrayMatcher,
    channel: ControlChannel,
    shut_down: AtomicBool,
}

impl ProcessSupervisor {
    pub fn new(worker: WorkerConfig, reaper: &ReaperConfig, channel: ControlChannel) -> Self {
        Self {
            child: Mutex::new(None),
            worker,
            reaper_enabled: reaper.enabled,
            matcher: StrayMatcher::from_config(reaper),
            channel,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Kill leftover worker, transcoder and shell processes from earlier runs.
    pub fn reap_stray_instances(&self) -> ReapReport {
        if !self.reaper_enabled {
            return ReapReport::default();
        }
        self.reap_with(&mut SystemProcessTable::new())
    }

    pub fn reap_with(&self, table: &mut dyn ProcessTable) -> ReapReport {
        let report = reap_stray_instances(table, &self.matcher);
        if !report.killed.is_empty() || !report.failures.is_empty() {
            log::info!(
                "Stray scan: {} killed, {} skipped",
                report.killed.len(),
                report.failures.len()
            );
        }
        report
    }

    /// Launch the worker and block until it posts its readiness message,
    /// which is then removed. A worker that exits, stalls past the startup
    /// limit or is cancelled is killed before the error is returned.
    pub fn start_worker(&self, policy: WaitPolicy, cancel: &CancellationToken) -> Result<(), JobError> {
        self.spawn()?;

        let ready = wait_until("worker readiness", policy, cancel, || {
            if self.channel.contains(Message::Ready) {
                return Some(Ok(()));
            }
            let exited = self.check_alive().err()?;
            // It may have signalled readiness right before exiting.
            if self.channel.contains(Message::Ready) {
                return Some(Ok(()));
            }
            Some(Err(exited))
        });

        let outcome = match ready {
            Ok(inner) => inner,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = outcome {
            log::error!("Worker failed to start: {e}");
            if let Err(kill_err) = self.kill_worker() {
                log::warn!("{kill_err}");
            }
            return Err(e);
        }

        self.channel.clear(&[Message::Ready])?;
        log::info!("Worker ready");
        Ok(())
    }

    fn spawn(&self) -> Result<(), JobError> {
        log::info!(
            "Spawning worker: {} (in {})",
            display_command(&self.worker.program, &self.worker.args),
            self.channel.dir().display()
        );

        let child = silent_command(&self.worker.program)
            .args(&self.worker.args)
            .current_dir(self.channel.dir())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: self.worker.program.clone(),
                source,
            })?;

        log::info!("Worker started (PID {})", child.id());
        *self.child_slot() = Some(child);
        self.shut_down.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// The owned child. A panic elsewhere while holding the lock must not
    /// hide the handle from kill and liveness checks.
    fn child_slot(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_alive(&self) -> bool {
        self.check_alive().is_ok()
    }

    /// Kill the owned worker, if any, and reap it.
    pub fn kill_worker(&self) -> Result<(), SupervisorError> {
        let Some(mut child) = self.child_slot().take() else {
            return Ok(());
        };

        let pid = child.id();
        log::info!("Killing worker process (PID {pid})");
        let killed = child.kill();
        let _ = child.wait();

        match killed {
            Ok(()) => Ok(()),
            // Already exited on its own.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(SupervisorError::Kill {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    /// Tear everything down: the owned worker, stray instances, and every
    /// channel message. Failures are logged, never returned. Calling this
    /// again before a new worker is started does nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("Shutting down worker session");

        if let Err(e) = self.kill_worker() {
            log::warn!("{e}");
        }
        self.reap_stray_instances();
        if let Err(e) = self.channel.purge() {
            log::warn!("Channel purge incomplete: {e}");
        }
    }
}

impl WorkerLiveness for ProcessSupervisor {
    fn check_alive(&self) -> Result<(), JobError> {
        let mut guard = self.child_slot();
        let Some(child) = guard.as_mut() else {
            return Err(JobError::WorkerExited("not running".to_string()));
        };

        match child.try_wait() {
            Ok(Some(status)) => Err(JobError::WorkerExited(describe_exit(status))),
            Ok(None) => Ok(()),
            Err(e) => {
                log::warn!("Could not poll worker status: {e}");
                Ok(())
            }
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
