//! Finding and terminating leftover worker and transcoder processes.
//!
//! Reaping is best-effort: a process that cannot be inspected or killed is
//! recorded and skipped, and the scan moves on to the next one.

use std::path::PathBuf;

use faststt_config::ReaperConfig;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::error::SupervisorError;

/// What the reaper needs to know about one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// `None` when the executable path is not readable (other users, kernel
    /// threads, sandboxed processes).
    pub exe: Option<PathBuf>,
}

/// A view of the OS process table.
pub trait ProcessTable {
    fn current_pid(&self) -> u32;
    /// Refresh and list every running pid.
    fn pids(&mut self) -> Result<Vec<u32>, SupervisorError>;
    fn inspect(&self, pid: u32) -> Result<ProcessInfo, SupervisorError>;
    fn kill(&self, pid: u32) -> Result<(), SupervisorError>;
}

/// [`ProcessTable`] backed by `sysinfo`.
pub struct SystemProcessTable {
    system: System,
    current: u32,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            current: std::process::id(),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn current_pid(&self) -> u32 {
        self.current
    }

    fn pids(&mut self) -> Result<Vec<u32>, SupervisorError> {
        self.system.refresh_processes(ProcessesToUpdate::All, true);
        let pids: Vec<u32> = self.system.processes().keys().map(|pid| pid.as_u32()).collect();
        // The list always holds at least this process.
        if pids.is_empty() {
            return Err(SupervisorError::ProcessTable {
                reason: "process list is empty".to_string(),
            });
        }
        Ok(pids)
    }

    fn inspect(&self, pid: u32) -> Result<ProcessInfo, SupervisorError> {
        let process = self
            .system
            .process(Pid::from_u32(pid))
            .ok_or_else(|| SupervisorError::Inspect {
                pid,
                reason: "process no longer exists".to_string(),
            })?;

        Ok(ProcessInfo {
            pid,
            name: process.name().to_string_lossy().into_owned(),
            exe: process.exe().map(|p| p.to_path_buf()),
        })
    }

    fn kill(&self, pid: u32) -> Result<(), SupervisorError> {
        let process = self
            .system
            .process(Pid::from_u32(pid))
            .ok_or_else(|| SupervisorError::Kill {
                pid,
                reason: "process no longer exists".to_string(),
            })?;

        if process.kill() {
            Ok(())
        } else {
            Err(SupervisorError::Kill {
                pid,
                reason: "signal refused".to_string(),
            })
        }
    }
}

/// Decides whether a process is a stray instance.
#[derive(Debug, Clone, Default)]
pub struct StrayMatcher {
    identifiers: Vec<String>,
    shell_names: Vec<String>,
}

impl StrayMatcher {
    pub fn new<I, S>(identifiers: I, shell_names: S) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let normalize = |s: &str| s.trim().to_lowercase();
        Self {
            identifiers: identifiers
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
            shell_names: shell_names
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &ReaperConfig) -> Self {
        Self::new(&config.identifiers, &config.shell_names)
    }

    /// Name or executable path contains an identifier, or the name is a
    /// shell name (with or without an `.exe` suffix). Case-insensitive.
    pub fn matches(&self, info: &ProcessInfo) -> bool {
        let name = info.name.to_lowercase();
        let exe = info
            .exe
            .as_ref()
            .map(|p| p.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let by_identifier = self
            .identifiers
            .iter()
            .any(|id| name.contains(id.as_str()) || exe.contains(id.as_str()));

        let bare_name = name.strip_suffix(".exe").unwrap_or(&name);
        let by_shell = self.shell_names.iter().any(|shell| shell == bare_name);

        by_identifier || by_shell
    }
}

/// Outcome of one scan.
#[derive(Debug, Default)]
pub struct ReapReport {
    pub killed: Vec<u32>,
    pub failures: Vec<SupervisorError>,
}

/// Terminate every process other than this one that `matcher` accepts.
/// Failures are logged and collected, never returned early.
pub fn reap_stray_instances(table: &mut dyn ProcessTable, matcher: &StrayMatcher) -> ReapReport {
    let own_pid = table.current_pid();
    let mut report = ReapReport::default();

    let pids = match table.pids() {
        Ok(pids) => pids,
        Err(e) => {
            log::warn!("Stray scan skipped: {e}");
            report.failures.push(e);
            return report;
        }
    };

    for pid in pids {
        if pid == own_pid {
            continue;
        }

        let info = match table.inspect(pid) {
            Ok(info) => info,
            Err(e) => {
                log::debug!("Skipping process {pid}: {e}");
                report.failures.push(e);
                continue;
            }
        };

        if !matcher.matches(&info) {
            continue;
        }

        match table.kill(pid) {
            Ok(()) => {
                log::info!("Killed stray process {} (PID {pid})", info.name);
                report.killed.push(pid);
            }
            Err(e) => {
                log::warn!("Could not kill stray process {} (PID {pid}): {e}", info.name);
                report.failures.push(e);
            }
        }
    }

    report
}
