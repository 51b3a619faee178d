//! Bounded, cancellable polling.
//!
//! File existence has no wake-up mechanism, so every rendezvous in the
//! protocol is a probe run at a fixed interval until it yields a value, the
//! time limit passes or the caller cancels.

use std::time::{Duration, Instant};

use faststt_config::{TimingConfig, MIN_POLL_INTERVAL};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("timed out after {waited:?} waiting for {what}")]
    TimedOut { what: String, waited: Duration },
    #[error("cancelled while waiting for {what}")]
    Cancelled { what: String },
}

impl From<WaitError> for JobError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::TimedOut { what, waited } => JobError::Timeout {
                rendezvous: what,
                waited,
            },
            WaitError::Cancelled { what } => JobError::Cancelled { rendezvous: what },
        }
    }
}

/// Poll interval and upper bound of one rendezvous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    /// The interval is clamped so a wait never spins without sleeping.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            timeout,
        }
    }

    pub fn startup(timing: &TimingConfig) -> Self {
        Self::new(timing.poll_interval(), timing.startup_timeout())
    }

    pub fn preprocess(timing: &TimingConfig) -> Self {
        Self::new(timing.poll_interval(), timing.preprocess_timeout())
    }

    pub fn job(timing: &TimingConfig) -> Self {
        Self::new(timing.poll_interval(), timing.job_timeout())
    }

    pub fn consume(timing: &TimingConfig) -> Self {
        Self::new(timing.poll_interval(), timing.consume_timeout())
    }
}

/// Run `probe` every `policy.interval` until it returns `Some`.
///
/// Cancellation is checked before each probe; the time limit after it, so a
/// probe that is already satisfied succeeds even with a zero timeout.
pub fn wait_until<T>(
    what: &str,
    policy: WaitPolicy,
    cancel: &CancellationToken,
    mut probe: impl FnMut() -> Option<T>,
) -> Result<T, WaitError> {
    let start = Instant::now();
    let interval = policy.interval.max(MIN_POLL_INTERVAL);

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled {
                what: what.to_string(),
            });
        }

        if let Some(value) = probe() {
            log::debug!("{what} after {:?}", start.elapsed());
            return Ok(value);
        }

        let waited = start.elapsed();
        if waited >= policy.timeout {
            return Err(WaitError::TimedOut {
                what: what.to_string(),
                waited,
            });
        }

        std::thread::sleep(interval.min(policy.timeout - waited).max(MIN_POLL_INTERVAL));
    }
}
