//! Session-level API used by the front-end: start a session, submit jobs,
//! end the session.

use std::path::Path;

use faststt_config::AppConfig;
use faststt_types::JobParameters;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::ipc::wait::WaitPolicy;
use crate::ipc::ControlChannel;
use crate::pipeline::{JobOutcome, JobPhase, JobPipeline};
use crate::transcoder::{FfmpegTranscoder, Preprocessor};
use crate::worker::ProcessSupervisor;

/// A running worker plus the pipeline that feeds it.
pub struct Controller {
    supervisor: ProcessSupervisor,
    pipeline: JobPipeline,
}

impl Controller {
    /// Start a session with the ffmpeg transcoder.
    pub fn start_session(config: &AppConfig, cancel: &CancellationToken) -> Result<Self, JobError> {
        let transcoder = FfmpegTranscoder::new(config.transcoder.clone());
        Self::start_session_with(config, Box::new(transcoder), cancel)
    }

    /// Reap stray processes, purge the channel, launch the worker and wait
    /// for it to report ready.
    pub fn start_session_with(
        config: &AppConfig,
        preprocessor: Box<dyn Preprocessor>,
        cancel: &CancellationToken,
    ) -> Result<Self, JobError> {
        let channel = ControlChannel::open(&config.runtime_dir)?;
        let supervisor =
            ProcessSupervisor::new(config.worker.clone(), &config.reaper, channel.clone());

        supervisor.reap_stray_instances();
        channel.purge()?;
        supervisor.start_worker(WaitPolicy::startup(&config.timing), cancel)?;

        let pipeline = JobPipeline::from_config(config, channel, preprocessor);
        Ok(Self {
            supervisor,
            pipeline,
        })
    }

    /// Transcribe `source` into `destination`.
    ///
    /// Errors that leave the worker in an unknown state (time limit,
    /// cancellation, worker exit) end the session; later calls return
    /// [`JobError::SessionClosed`].
    pub fn submit_job(
        &mut self,
        source: &Path,
        destination: &Path,
        params: &JobParameters,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, JobError> {
        let result = self
            .pipeline
            .submit(source, destination, params, &self.supervisor, cancel);

        if let Err(e) = &result {
            if e.poisons_session() {
                log::warn!("Ending session after: {e}");
                self.end_session();
            }
        }
        result
    }

    /// Kill the worker and any strays and purge the channel. Safe to call
    /// any number of times, from normal and error paths alike.
    pub fn end_session(&mut self) {
        self.pipeline.tear_down();
        self.supervisor.shutdown();
    }

    pub fn is_open(&self) -> bool {
        self.pipeline.phase() != JobPhase::TornDown
    }

    pub fn phase(&self) -> JobPhase {
        self.pipeline.phase()
    }

    pub fn worker_alive(&self) -> bool {
        self.supervisor.is_alive()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.end_session();
    }
}
