//! FastSTT controller: hands transcription jobs to a long-running external
//! worker through a shared directory and collects the results.

pub mod command;
pub mod controller;
pub mod error;
pub mod file_ops;
pub mod ipc;
pub mod logging;
pub mod negotiator;
pub mod pipeline;
pub mod transcoder;
pub mod worker;

pub use controller::Controller;
pub use error::{ChannelError, JobError, SupervisorError};
pub use ipc::{ControlChannel, Message, WaitPolicy};
pub use negotiator::SessionState;
pub use pipeline::{JobOutcome, JobPhase, JobPipeline, PipelinePolicies};
pub use transcoder::{FfmpegTranscoder, Preprocessor};
pub use worker::{ProcessSupervisor, WorkerLiveness};

pub use faststt_config as config;
pub use faststt_types as types;
