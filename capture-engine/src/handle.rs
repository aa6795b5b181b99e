//! Per-instance engine state
//!
//! The handle is created once per capture session and owns the recorded CPU
//! count together with the last-error text of the engine driving it.

use crate::errors::EngineError;

/// Upper bound, in bytes, of the last-error text kept by a handle.
pub const LASTERR_SIZE: usize = 256;

/// Bounded diagnostic left behind by the most recent failing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastError(String);

impl LastError {
    pub fn set(&mut self, message: &str) {
        let mut end = message.len().min(LASTERR_SIZE);
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        self.0.clear();
        self.0.push_str(&message[..end]);
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct EngineHandle {
    num_cpus: u32,
    last_error: LastError,
}

impl EngineHandle {
    pub fn alloc() -> Self {
        Self::default()
    }

    /// Available (not necessarily online) CPUs recorded during `init`.
    pub fn num_cpus(&self) -> u32 {
        self.num_cpus
    }

    pub(crate) fn record_cpus(&mut self, num_cpus: u32) {
        self.num_cpus = num_cpus;
    }

    pub fn last_error(&self) -> &str {
        self.last_error.as_str()
    }

    /// Stores the rendered error and hands it back for propagation.
    pub fn fail(&mut self, err: EngineError) -> EngineError {
        self.last_error.set(&err.to_string());
        err
    }
}
