//! Application configuration, stored as a JSON file.
//!
//! Every section is defaulted, so an empty object (or a missing file when
//! using [`load_or_default`]) yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lower bound for the channel poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Channel directory shared with the worker; also its working directory.
    pub runtime_dir: PathBuf,
    /// Where the transcoder writes the intermediate artifact.
    pub staging_dir: PathBuf,
    pub log_dir: PathBuf,
    pub worker: WorkerConfig,
    pub transcoder: TranscoderConfig,
    pub reaper: ReaperConfig,
    pub timing: TimingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from("runtime"),
            staging_dir: PathBuf::from("."),
            log_dir: PathBuf::from("logs"),
            worker: WorkerConfig::default(),
            transcoder: TranscoderConfig::default(),
            reaper: ReaperConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

/// How to launch the long-running recognition worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        if cfg!(windows) {
            Self {
                program: "cmd".to_string(),
                args: vec!["/C".to_string(), "_infer_waiter_.bat".to_string()],
            }
        } else {
            Self {
                program: "sh".to_string(),
                args: vec!["_infer_waiter_.sh".to_string()],
            }
        }
    }
}

/// Settings for the external audio transcoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub program: String,
    /// Thread count passed to the transcoder. `None` uses every core.
    pub threads: Option<usize>,
    pub sample_rate: u32,
    pub channels: u8,
    pub bitrate: String,
    pub highpass_hz: u32,
    pub lowpass_hz: u32,
    /// File name of the intermediate artifact inside the staging dir.
    pub intermediate_name: String,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            threads: None,
            sample_rate: 48_000,
            channels: 1,
            bitrate: "96k".to_string(),
            highpass_hz: 50,
            lowpass_hz: 15_000,
            intermediate_name: "input.mp3".to_string(),
        }
    }
}

/// Which leftover processes get terminated at startup and shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    pub enabled: bool,
    /// Case-insensitive substrings matched against process names and paths.
    pub identifiers: Vec<String>,
    /// Shell process names matched exactly (case-insensitive).
    pub shell_names: Vec<String>,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            identifiers: vec![
                "python".to_string(),
                "ffmpeg".to_string(),
                "faststt".to_string(),
            ],
            shell_names: if cfg!(windows) {
                vec!["cmd".to_string()]
            } else {
                Vec::new()
            },
        }
    }
}

/// Poll interval and per-rendezvous time limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub startup_timeout_secs: u64,
    pub preprocess_timeout_secs: u64,
    pub job_timeout_secs: u64,
    pub consume_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            startup_timeout_secs: 120,
            preprocess_timeout_secs: 600,
            job_timeout_secs: 7_200,
            consume_timeout_secs: 30,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn preprocess_timeout(&self) -> Duration {
        Duration::from_secs(self.preprocess_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn consume_timeout(&self) -> Duration {
        Duration::from_secs(self.consume_timeout_secs)
    }
}

/// Load the configuration from `path`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    load_config(path)
}

/// Write the configuration to `path` as pretty JSON.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    std::fs::write(path, json).map_err(write_err)
}
