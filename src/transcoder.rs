//! Normalizes the input audio before it is handed to the worker.
//!
//! The transcoder is an external program. It is run with a fixed filter
//! chain and its completion is judged by its exit status and by the output
//! file existing afterwards.

use std::io::Read;
use std::path::Path;
use std::process::Stdio;
use std::thread;

use faststt_config::TranscoderConfig;
use tokio_util::sync::CancellationToken;

use crate::command::{describe_exit, display_command, silent_command};
use crate::error::JobError;
use crate::ipc::wait::{wait_until, WaitPolicy};

/// Lines of transcoder stderr kept for error messages.
const STDERR_TAIL_LINES: usize = 5;

/// Turns a source artifact into the canonical intermediate the worker reads.
pub trait Preprocessor: Send {
    /// Produce `output` from `input`, blocking until it exists.
    fn preprocess(
        &self,
        input: &Path,
        output: &Path,
        policy: WaitPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), JobError>;
}

/// ffmpeg invoked with a resample / mono / band-pass / bitrate chain.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    fn threads(&self) -> usize {
        self.config.threads.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Full argument list for one conversion.
    pub fn arguments(&self, input: &Path, output: &Path) -> Vec<String> {
        let cfg = &self.config;
        let filters = format!(
            "aresample=osf=s16:dither_method=triangular_hp,highpass=f={},lowpass=f={}",
            cfg.highpass_hz, cfg.lowpass_hz
        );

        vec![
            "-y".to_string(),
            "-threads".to_string(),
            self.threads().to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-af".to_string(),
            filters,
            "-sample_fmt".to_string(),
            "s16".to_string(),
            "-ar".to_string(),
            cfg.sample_rate.to_string(),
            "-ac".to_string(),
            cfg.channels.to_string(),
            "-b:a".to_string(),
            cfg.bitrate.clone(),
            "-map".to_string(),
            "a".to_string(),
            output.display().to_string(),
        ]
    }
}

impl Preprocessor for FfmpegTranscoder {
    fn preprocess(
        &self,
        input: &Path,
        output: &Path,
        policy: WaitPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        let args = self.arguments(input, output);
        log::info!("Transcoding: {}", display_command(&self.config.program, &args));

        let mut child = silent_command(&self.config.program)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                JobError::PreprocessingFailed(format!(
                    "failed to start {}: {e}",
                    self.config.program
                ))
            })?;

        // Drained on its own thread so a chatty transcoder cannot fill the pipe.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        let waited = wait_until("transcoder to exit", policy, cancel, || {
            child.try_wait().transpose()
        });

        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(JobError::PreprocessingFailed(format!(
                    "failed to wait for {}: {e}",
                    self.config.program
                )));
            }
            Err(e) => {
                log::warn!("Killing transcoder: {e}");
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(JobError::PreprocessingFailed(format!(
                "{} ({}): {}",
                self.config.program,
                describe_exit(status),
                stderr_tail(&stderr)
            )));
        }

        wait_until("transcoder output", policy, cancel, || output.exists().then_some(()))?;
        Ok(())
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
