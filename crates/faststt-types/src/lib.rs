//! Shared data model for the FastSTT controller and its CLI.

pub mod catalog;
pub mod params;

pub use catalog::{default_model, language_code_from_label, resolve_model, ModelEntry, MODEL_CATALOG};
pub use params::{ComputeType, Device, JobParameters, ModelSelection, ParseParamError};
