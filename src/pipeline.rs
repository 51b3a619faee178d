//! One transcription job, end to end.
//!
//! ```text
//! Idle -> Validating -> Preprocessing -> Submitting -> AwaitingOutcome -> Finalizing -> Idle
//! Idle -> TornDown
//! ```
//!
//! Parameter messages are all posted before the input artifact is moved into
//! the channel; the worker treats the input's arrival as "everything else is
//! already there". Only one job is ever in flight on a channel.

use std::path::{Path, PathBuf};

use faststt_config::{AppConfig, TimingConfig};
use faststt_types::JobParameters;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::file_ops::remove_if_exists;
use crate::ipc::channel::describe_any;
use crate::ipc::wait::{wait_until, WaitPolicy};
use crate::ipc::{ControlChannel, Message};
use crate::negotiator::{self, SessionState};
use crate::transcoder::Preprocessor;
use crate::worker::WorkerLiveness;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Validating,
    Preprocessing,
    Submitting,
    AwaitingOutcome,
    Finalizing,
    TornDown,
}

/// What the worker made of a job. Exactly one per submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The transcription was written to this path.
    Completed(PathBuf),
    /// The worker posted its failure sentinel, with its content if any.
    Failed { reason: Option<String> },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }

    /// Fold a worker failure into [`JobError::JobFailed`].
    pub fn into_result(self) -> Result<PathBuf, JobError> {
        match self {
            JobOutcome::Completed(path) => Ok(path),
            JobOutcome::Failed { reason } => Err(JobError::JobFailed(reason)),
        }
    }
}

/// Time limits for the rendezvous points of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelinePolicies {
    pub preprocess: WaitPolicy,
    pub outcome: WaitPolicy,
    pub consume: WaitPolicy,
}

impl PipelinePolicies {
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self {
            preprocess: WaitPolicy::preprocess(timing),
            outcome: WaitPolicy::job(timing),
            consume: WaitPolicy::consume(timing),
        }
    }
}

pub struct JobPipeline {
    channel: ControlChannel,
    preprocessor: Box<dyn Preprocessor>,
    /// Where the preprocessed artifact is produced before it enters the channel.
    intermediate: PathBuf,
    policies: PipelinePolicies,
    state: SessionState,
    phase: JobPhase,
}

impl JobPipeline {
    pub fn new(
        channel: ControlChannel,
        preprocessor: Box<dyn Preprocessor>,
        intermediate: PathBuf,
        policies: PipelinePolicies,
    ) -> Self {
        Self {
            channel,
            preprocessor,
            intermediate,
            policies,
            state: SessionState::default(),
            phase: JobPhase::Idle,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        channel: ControlChannel,
        preprocessor: Box<dyn Preprocessor>,
    ) -> Self {
        Self::new(
            channel,
            preprocessor,
            config.staging_dir.join(&config.transcoder.intermediate_name),
            PipelinePolicies::from_timing(&config.timing),
        )
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn session_state(&self) -> &SessionState {
        &self.state
    }

    pub fn channel(&self) -> &ControlChannel {
        &self.channel
    }

    /// Refuse all further jobs.
    pub fn tear_down(&mut self) {
        self.phase = JobPhase::TornDown;
    }

    /// Run one job. A worker-side failure is `Ok(JobOutcome::Failed)`;
    /// `Err` means the job never produced an outcome.
    pub fn submit(
        &mut self,
        source: &Path,
        destination: &Path,
        params: &JobParameters,
        liveness: &dyn WorkerLiveness,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, JobError> {
        if self.phase == JobPhase::TornDown {
            return Err(JobError::SessionClosed);
        }

        log::info!(
            "Job: {} -> {} (model={}, device={}, compute_type={})",
            source.display(),
            destination.display(),
            params.model_id,
            params.device,
            params.compute_type
        );

        let mut channel_touched = false;
        let result = self.run(source, destination, params, liveness, cancel, &mut channel_touched);

        if let Err(e) = &result {
            log::error!("Job aborted in {:?}: {e}", self.phase);
            if let Err(clean_err) = remove_if_exists(&self.intermediate) {
                log::warn!("Could not remove {}: {clean_err}", self.intermediate.display());
            }
            if channel_touched {
                // The worker may or may not have acted on what was posted.
                self.state.reset();
                if let Err(clean_err) = self.channel.clear(&Message::PER_JOB) {
                    log::warn!("Channel reset incomplete: {clean_err}");
                }
            }
        }

        if self.phase != JobPhase::TornDown {
            self.phase = JobPhase::Idle;
        }
        result
    }

    fn run(
        &mut self,
        source: &Path,
        destination: &Path,
        params: &JobParameters,
        liveness: &dyn WorkerLiveness,
        cancel: &CancellationToken,
        channel_touched: &mut bool,
    ) -> Result<JobOutcome, JobError> {
        self.phase = JobPhase::Validating;
        if !source.exists() {
            return Err(JobError::InputNotFound(source.to_path_buf()));
        }
        // A stale destination is replaced when the result is moved into place.
        remove_if_exists(&self.intermediate).map_err(|source| JobError::Io {
            context: format!("removing stale {}", self.intermediate.display()),
            source,
        })?;

        self.phase = JobPhase::Preprocessing;
        self.preprocessor
            .preprocess(source, &self.intermediate, self.policies.preprocess, cancel)?;

        self.phase = JobPhase::Submitting;
        *channel_touched = true;
        let reload = negotiator::requires_reload(&self.state, params);
        let posted = self.post_parameters(params, reload)?;

        self.phase = JobPhase::AwaitingOutcome;
        self.channel.adopt(Message::Input, &self.intermediate)?;
        let outcome = self.await_outcome(liveness, cancel)?;

        self.phase = JobPhase::Finalizing;
        let result = match outcome {
            Message::Result => {
                self.channel.take_into(Message::Result, destination)?;
                log::info!("Transcription written to {}", destination.display());
                JobOutcome::Completed(destination.to_path_buf())
            }
            _ => {
                let reason = self
                    .channel
                    .read(Message::Failure)?
                    .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
                    .filter(|text| !text.is_empty());
                log::warn!("Worker reported failure: {}", reason.as_deref().unwrap_or("no details"));
                JobOutcome::Failed { reason }
            }
        };

        self.await_requests_consumed(&posted, cancel);
        if let Err(e) = self.channel.clear(&Message::PER_JOB) {
            log::warn!("Channel reset incomplete: {e}");
        }
        negotiator::commit(&mut self.state, params);

        Ok(result)
    }

    /// Clear leftovers of an interrupted job, then post every parameter.
    /// Returns the messages the worker deletes once it has read them. The
    /// input payload is not among them; it goes with the per-job clear.
    fn post_parameters(&self, params: &JobParameters, reload: bool) -> Result<Vec<Message>, JobError> {
        self.channel.clear(&Message::PER_JOB)?;

        let level = params.precision_level.to_string();
        let texts: [(Message, &str); 5] = [
            (Message::PrecisionLevel, &level),
            (Message::Language, &params.language_hint),
            (Message::ModelId, &params.model_id),
            (Message::Device, params.device.as_str()),
            (Message::ComputeType, params.compute_type.as_str()),
        ];
        let flags = [
            Message::auto_detect(params.auto_detect_language),
            Message::report_timings(params.report_timings),
        ];

        let mut posted = Vec::with_capacity(9);
        for (message, text) in &texts[..2] {
            self.channel.post_text(*message, text)?;
            posted.push(*message);
        }
        for flag in flags {
            self.channel.post(flag, None)?;
            posted.push(flag);
        }
        for (message, text) in &texts[2..] {
            self.channel.post_text(*message, text)?;
            posted.push(*message);
        }
        if reload {
            log::info!("Requesting model reload ({})", params.model_id);
            self.channel.post(Message::ReloadModel, None)?;
            posted.push(Message::ReloadModel);
        }

        Ok(posted)
    }

    fn await_outcome(
        &self,
        liveness: &dyn WorkerLiveness,
        cancel: &CancellationToken,
    ) -> Result<Message, JobError> {
        let what = describe_any(&Message::OUTCOMES);
        wait_until(&what, self.policies.outcome, cancel, || {
            if let Some(message) = self.channel.first_present(&Message::OUTCOMES) {
                return Some(Ok(message));
            }
            liveness.check_alive().err().map(Err)
        })?
    }

    /// The worker removes what it consumed after posting the outcome. Wait
    /// for that so the next job never overlaps with this one; a worker that
    /// leaves files behind only costs the consume time limit.
    fn await_requests_consumed(&self, posted: &[Message], cancel: &CancellationToken) {
        let waited = wait_until("request messages to be consumed", self.policies.consume, cancel, || {
            posted.iter().all(|m| !self.channel.contains(*m)).then_some(())
        });
        if let Err(e) = waited {
            log::warn!("{e}; clearing leftovers");
        }
    }
}
