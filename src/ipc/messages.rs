//! The fixed set of message names understood by both sides of the channel.

use std::fmt;

/// One mailbox slot. Each maps to a single file in the channel directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    /// Worker → controller: able to accept jobs.
    Ready,
    /// Worker → controller: the transcription text.
    Result,
    /// Worker → controller: the job failed.
    Failure,
    /// Controller → worker: the normalized audio. Its arrival starts the job.
    Input,
    ModelId,
    Device,
    ComputeType,
    Language,
    PrecisionLevel,
    EnableAutoDetect,
    DisableAutoDetect,
    EnableReportTimings,
    DisableReportTimings,
    /// Controller → worker: drop the loaded model before the next input.
    ReloadModel,
}

impl Message {
    pub const ALL: [Message; 14] = [
        Message::Ready,
        Message::Result,
        Message::Failure,
        Message::Input,
        Message::ModelId,
        Message::Device,
        Message::ComputeType,
        Message::Language,
        Message::PrecisionLevel,
        Message::EnableAutoDetect,
        Message::DisableAutoDetect,
        Message::EnableReportTimings,
        Message::DisableReportTimings,
        Message::ReloadModel,
    ];

    /// Everything a job may leave behind. `Ready` belongs to the session.
    pub const PER_JOB: [Message; 13] = [
        Message::Result,
        Message::Failure,
        Message::Input,
        Message::ModelId,
        Message::Device,
        Message::ComputeType,
        Message::Language,
        Message::PrecisionLevel,
        Message::EnableAutoDetect,
        Message::DisableAutoDetect,
        Message::EnableReportTimings,
        Message::DisableReportTimings,
        Message::ReloadModel,
    ];

    /// Outcomes in priority order: a result wins over a failure posted alongside it.
    pub const OUTCOMES: [Message; 2] = [Message::Result, Message::Failure];

    pub fn auto_detect(enabled: bool) -> Message {
        if enabled {
            Message::EnableAutoDetect
        } else {
            Message::DisableAutoDetect
        }
    }

    pub fn report_timings(enabled: bool) -> Message {
        if enabled {
            Message::EnableReportTimings
        } else {
            Message::DisableReportTimings
        }
    }

    /// File name inside the channel directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Message::Ready => "ready_to_transcribe.txt",
            Message::Result => "transcription.txt",
            Message::Failure => "finished.txt",
            Message::Input => "input.mp3",
            Message::ModelId => "model.txt",
            Message::Device => "device.txt",
            Message::ComputeType => "compute_type.txt",
            Message::Language => "language.txt",
            Message::PrecisionLevel => "precision.txt",
            Message::EnableAutoDetect => "enable_auto_language_detect.txt",
            Message::DisableAutoDetect => "disable_auto_language_detect.txt",
            Message::EnableReportTimings => "enable_report_timings.txt",
            Message::DisableReportTimings => "disable_report_timings.txt",
            Message::ReloadModel => "reload_model.txt",
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}
