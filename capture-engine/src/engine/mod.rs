//! Capture engine contract
//!
//! Every backend implements [`Engine`]. The host picks one by name through
//! the [`registry`](crate::registry), then drives it from a single thread:
//! `init`, a loop of `next`, optional `configure`/`get_stats`, and `close`.
//!
//! Operations that fail also record their error text in the engine's handle,
//! readable through [`Engine::last_error`] until the next failing call.

pub mod modern_bpf;
pub mod noop;

pub use modern_bpf::{ModernBpfEngine, MODERN_BPF_ENGINE, MODERN_BPF_ENGINE_NAME};
pub use noop::{NoopEngine, NOOP_ENGINE, NOOP_ENGINE_NAME};

use crate::configuration::Probe;
use crate::errors::Result;
use crate::lifecycle::{EngineState, ProbeVersions};
use crate::procfs_threads::ThreadInfo;
use crate::retrieval::Retrieved;
use crate::stats::CaptureStats;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Live,
    Replay,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Live => write!(f, "live"),
            CaptureMode::Replay => write!(f, "replay"),
        }
    }
}

/// Options handed to an engine when it is opened.
///
/// The registry only looks at `engine_name`; `probe` belongs to backends
/// that load a kernel probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenArgs {
    pub engine_name: String,
    pub probe: Probe,
}

impl OpenArgs {
    pub fn new(engine_name: &str) -> Self {
        Self {
            engine_name: engine_name.to_string(),
            probe: Probe::default(),
        }
    }

    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }
}

pub trait Engine {
    fn name(&self) -> &'static str;

    fn mode(&self) -> CaptureMode;

    fn state(&self) -> EngineState;

    /// Acquires every kernel resource the backend needs.
    ///
    /// Not restartable: after a failure only `close` is meaningful, and a
    /// retry needs a freshly allocated engine.
    fn init(&mut self, args: &OpenArgs) -> Result<ProbeVersions>;

    /// Releases whatever `init` acquired. Safe in every state and idempotent.
    fn close(&mut self) -> Result<()>;

    /// Returns at most one event without waiting for data.
    fn next(&mut self) -> Result<Retrieved<'_>>;

    fn start_capture(&mut self) -> Result<()>;

    fn stop_capture(&mut self) -> Result<()>;

    /// Applies a setting given as its raw tag and two arguments.
    fn configure(&mut self, setting: u32, arg1: u64, arg2: u64) -> Result<()>;

    fn get_stats(&mut self) -> Result<CaptureStats>;

    fn get_n_tracepoint_hit(&mut self) -> Result<u64>;

    /// CPU count recorded by `init`; never re-queried.
    fn get_n_devs(&self) -> u32;

    fn get_max_buf_used(&self) -> u64 {
        noop::get_max_buf_used()
    }

    fn get_threadlist(&mut self) -> Result<Vec<ThreadInfo>>;

    fn get_vpid(&self, pid: i64) -> i64 {
        noop::get_vxid(pid)
    }

    fn get_vtid(&self, tid: i64) -> i64 {
        noop::get_vxid(tid)
    }

    /// Pid of the current process as seen from the host pid namespace.
    fn getpid_global(&mut self) -> Result<i64>;

    fn last_error(&self) -> &str;
}
