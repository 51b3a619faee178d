//! The external recognition worker: launching it, watching it, and cleaning
//! up after it and any earlier instances.

pub mod process_manager;
pub mod reaper;

pub use process_manager::ProcessSupervisor;
pub use reaper::{
    reap_stray_instances, ProcessInfo, ProcessTable, ReapReport, StrayMatcher, SystemProcessTable,
};

use crate::error::JobError;

/// Lets long waits notice a worker that died instead of running into
/// their time limit.
pub trait WorkerLiveness {
    fn check_alive(&self) -> Result<(), JobError>;
}
