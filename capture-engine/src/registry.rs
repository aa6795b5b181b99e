//! Static table of the available engines
//!
//! Built at compile time and never mutated, so lookups need no locking.

use crate::engine::{CaptureMode, Engine, OpenArgs, MODERN_BPF_ENGINE, NOOP_ENGINE};
use crate::errors::{EngineError, Result};
use log::debug;

/// Registration of one backend: its name, capture mode and constructor.
pub struct EngineDescriptor {
    pub name: &'static str,
    pub mode: CaptureMode,
    pub alloc: fn(&OpenArgs) -> Box<dyn Engine>,
}

impl EngineDescriptor {
    /// Exact comparison: `modern_bpf2` or `modern` never select `modern_bpf`.
    pub fn matches(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn alloc(&self, args: &OpenArgs) -> Box<dyn Engine> {
        (self.alloc)(args)
    }
}

impl std::fmt::Debug for EngineDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineDescriptor")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish()
    }
}

pub static ENGINES: &[&EngineDescriptor] = &[&MODERN_BPF_ENGINE, &NOOP_ENGINE];

pub fn find(name: &str) -> Result<&'static EngineDescriptor> {
    let descriptor = ENGINES
        .iter()
        .copied()
        .find(|descriptor| descriptor.matches(name))
        .ok_or_else(|| EngineError::UnknownEngine {
            name: name.to_string(),
            available: available().iter().map(|n| n.to_string()).collect(),
        })?;
    debug!("selected engine {} ({})", descriptor.name, descriptor.mode);
    Ok(descriptor)
}

pub fn available() -> Vec<&'static str> {
    ENGINES.iter().map(|descriptor| descriptor.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn should_match_only_the_exact_name() {
        assert!(MODERN_BPF_ENGINE.matches("modern_bpf"));
        assert!(!MODERN_BPF_ENGINE.matches("modern"));
        assert!(!MODERN_BPF_ENGINE.matches("modern_bpf_ext"));
        assert!(!MODERN_BPF_ENGINE.matches(""));
    }

    #[test]
    fn should_find_registered_engines() {
        assert_eq!(find("modern_bpf").unwrap().name, "modern_bpf");
        assert_eq!(find("noop").unwrap().name, "noop");
    }

    #[test]
    fn should_fail_on_unknown_engine() {
        assert_matches!(find("kmod"), Err(EngineError::UnknownEngine { .. }));
    }

    #[test]
    fn should_register_modern_bpf_as_live_only() {
        assert_eq!(find("modern_bpf").unwrap().mode, CaptureMode::Live);
    }

    #[test]
    fn should_allocate_unopened_engines() {
        let engine = find("noop").unwrap().alloc(&OpenArgs::new("noop"));

        assert_eq!(engine.name(), "noop");
        assert_eq!(engine.state(), crate::lifecycle::EngineState::Allocated);
    }
}
