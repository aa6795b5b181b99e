//! Unified error types for the capture engines
//!
//! Every failing engine operation returns one of these and also leaves its
//! rendered text in the engine handle's last-error buffer.

use crate::lifecycle::{AcquisitionStep, EngineState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unable to configure the probe library: {message}")]
    ConfigurationFailed { message: String },

    #[error("{step} failed: {source}")]
    StepFailed {
        step: AcquisitionStep,
        source: anyhow::Error,
    },

    #[error("eBPF program failed to load: {program_name} - {source}")]
    EbpfLoadFailed {
        program_name: String,
        source: anyhow::Error,
    },

    #[error("eBPF program failed to attach: {program_name} - {source}")]
    EbpfAttachmentFailed {
        program_name: String,
        source: anyhow::Error,
    },

    #[error("eBPF map not found: {map_name}")]
    MapNotFound { map_name: String },

    #[error("eBPF program not found: {program_name}")]
    ProgramNotFound { program_name: String },

    #[error("Unsupported setting {setting} (args {arg1}, {arg2})")]
    UnknownSetting { setting: u32, arg1: u64, arg2: u64 },

    #[error("Unable to read events from the ring buffers: {source}")]
    RetrievalFailed { source: anyhow::Error },

    #[error("Unable to read probe statistics: {source}")]
    StatsUnavailable { source: anyhow::Error },

    #[error("Unknown engine: {name}. Available engines: {available:?}")]
    UnknownEngine {
        name: String,
        available: Vec<String>,
    },

    #[error("Cannot {operation} an engine in state {state}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },

    #[error("Unable to read the process filesystem: {source}")]
    ProcfsFailed { source: anyhow::Error },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl EngineError {
    pub(crate) fn step(step: AcquisitionStep, source: impl Into<anyhow::Error>) -> Self {
        EngineError::StepFailed {
            step,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
