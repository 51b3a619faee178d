//! Job parameters handed to the recognition worker.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Precision level used when the caller does not pick one.
pub const DEFAULT_PRECISION_LEVEL: u8 = 5;

/// Language hint used when the caller does not pick one.
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseParamError {
    #[error("unknown device '{0}' (expected cpu or cuda)")]
    Device(String),
    #[error("unknown compute type '{0}'")]
    ComputeType(String),
}

/// Execution device the worker runs the model on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            other => Err(ParseParamError::Device(other.to_string())),
        }
    }
}

/// Numeric format the model weights are evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComputeType {
    #[serde(rename = "int8")]
    Int8,
    #[serde(rename = "float32")]
    Float32,
    #[serde(rename = "int8_float16")]
    Int8Float16,
    #[serde(rename = "float16")]
    Float16,
}

impl ComputeType {
    /// Pick the compute type for a device. GPUs get half precision,
    /// CPUs full precision; the low-precision choice quantizes to int8.
    pub fn for_device(device: Device, high_precision: bool) -> Self {
        match (device, high_precision) {
            (Device::Cuda, true) => ComputeType::Float16,
            (Device::Cuda, false) => ComputeType::Int8Float16,
            (Device::Cpu, true) => ComputeType::Float32,
            (Device::Cpu, false) => ComputeType::Int8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComputeType::Int8 => "int8",
            ComputeType::Float32 => "float32",
            ComputeType::Int8Float16 => "int8_float16",
            ComputeType::Float16 => "float16",
        }
    }
}

impl fmt::Display for ComputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComputeType {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "int8" => Ok(ComputeType::Int8),
            "float32" => Ok(ComputeType::Float32),
            "int8_float16" => Ok(ComputeType::Int8Float16),
            "float16" => Ok(ComputeType::Float16),
            other => Err(ParseParamError::ComputeType(other.to_string())),
        }
    }
}

/// The three fields that decide whether the worker must reload its model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSelection {
    pub model_id: String,
    pub device: Device,
    pub compute_type: ComputeType,
}

/// Parameters of a single transcription job. Not modified after submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameters {
    pub model_id: String,
    pub device: Device,
    pub compute_type: ComputeType,
    pub language_hint: String,
    pub auto_detect_language: bool,
    pub report_timings: bool,
    pub precision_level: u8,
}

impl JobParameters {
    pub fn new(model_id: impl Into<String>, device: Device, compute_type: ComputeType) -> Self {
        Self {
            model_id: model_id.into(),
            device,
            compute_type,
            language_hint: DEFAULT_LANGUAGE.to_string(),
            auto_detect_language: false,
            report_timings: false,
            precision_level: DEFAULT_PRECISION_LEVEL,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_hint = language.into();
        self
    }

    pub fn with_auto_detect(mut self, enabled: bool) -> Self {
        self.auto_detect_language = enabled;
        self
    }

    pub fn with_report_timings(mut self, enabled: bool) -> Self {
        self.report_timings = enabled;
        self
    }

    pub fn with_precision_level(mut self, level: u8) -> Self {
        self.precision_level = level;
        self
    }

    pub fn selection(&self) -> ModelSelection {
        ModelSelection {
            model_id: self.model_id.clone(),
            device: self.device,
            compute_type: self.compute_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_type_for_device() {
        assert_eq!(ComputeType::for_device(Device::Cuda, true), ComputeType::Float16);
        assert_eq!(ComputeType::for_device(Device::Cuda, false), ComputeType::Int8Float16);
        assert_eq!(ComputeType::for_device(Device::Cpu, true), ComputeType::Float32);
        assert_eq!(ComputeType::for_device(Device::Cpu, false), ComputeType::Int8);
    }

    #[test]
    fn test_parse_device_and_compute_type() {
        assert_eq!("CUDA".parse::<Device>(), Ok(Device::Cuda));
        assert_eq!(" cpu ".parse::<Device>(), Ok(Device::Cpu));
        assert!("tpu".parse::<Device>().is_err());
        assert_eq!("int8_float16".parse::<ComputeType>(), Ok(ComputeType::Int8Float16));
        assert_eq!(ComputeType::Int8Float16.to_string(), "int8_float16");
    }

    #[test]
    fn test_builder_defaults() {
        let params = JobParameters::new("base", Device::Cuda, ComputeType::Float16)
            .with_language("de")
            .with_report_timings(true);
        assert_eq!(params.language_hint, "de");
        assert!(params.report_timings);
        assert!(!params.auto_detect_language);
        assert_eq!(params.precision_level, DEFAULT_PRECISION_LEVEL);
        assert_eq!(params.selection().model_id, "base");
    }
}
