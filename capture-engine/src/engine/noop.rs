//! Engine that captures nothing, plus the shared no-op helpers other
//! backends defer to for operations they have no use for.

use super::{CaptureMode, Engine, OpenArgs};
use crate::errors::{EngineError, Result};
use crate::handle::EngineHandle;
use crate::lifecycle::{EngineState, ProbeVersions};
use crate::procfs_threads::{self, ThreadInfo};
use crate::registry::EngineDescriptor;
use crate::retrieval::Retrieved;
use crate::settings;
use crate::stats::CaptureStats;
use log::debug;
use std::path::PathBuf;

pub const NOOP_ENGINE_NAME: &str = "noop";

pub static NOOP_ENGINE: EngineDescriptor = EngineDescriptor {
    name: NOOP_ENGINE_NAME,
    mode: CaptureMode::Live,
    alloc: alloc_noop,
};

fn alloc_noop(args: &OpenArgs) -> Box<dyn Engine> {
    Box::new(NoopEngine::new(args.probe.host_root.clone()))
}

/// Virtual pid/tid translation for backends without namespace awareness.
pub fn get_vxid(_xid: i64) -> i64 {
    0
}

pub fn get_max_buf_used() -> u64 {
    0
}

#[derive(Debug)]
pub struct NoopEngine {
    handle: EngineHandle,
    state: EngineState,
    host_root: PathBuf,
}

impl NoopEngine {
    pub fn new(host_root: PathBuf) -> Self {
        Self {
            handle: EngineHandle::alloc(),
            state: EngineState::Allocated,
            host_root,
        }
    }

    fn ensure_open(&mut self, operation: &'static str) -> Result<()> {
        self.state
            .ensure_open(operation)
            .map_err(|e| self.handle.fail(e))
    }
}

impl Engine for NoopEngine {
    fn name(&self) -> &'static str {
        NOOP_ENGINE_NAME
    }

    fn mode(&self) -> CaptureMode {
        CaptureMode::Live
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn init(&mut self, _args: &OpenArgs) -> Result<ProbeVersions> {
        if self.state != EngineState::Allocated {
            return Err(self.handle.fail(EngineError::InvalidState {
                operation: "init",
                state: self.state,
            }));
        }
        self.state = EngineState::Initialized;
        Ok(ProbeVersions::unversioned())
    }

    fn close(&mut self) -> Result<()> {
        self.state = EngineState::Closed;
        Ok(())
    }

    fn next(&mut self) -> Result<Retrieved<'_>> {
        self.ensure_open("read events from")?;
        Ok(Retrieved::Timeout)
    }

    fn start_capture(&mut self) -> Result<()> {
        if self.state.is_open() {
            self.state = EngineState::Capturing;
        }
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<()> {
        if self.state.is_open() {
            self.state = EngineState::Stopped;
        }
        Ok(())
    }

    fn configure(&mut self, setting: u32, arg1: u64, arg2: u64) -> Result<()> {
        if self.state == EngineState::Closed {
            return Err(self.handle.fail(EngineError::InvalidState {
                operation: "configure",
                state: self.state,
            }));
        }
        let setting = settings::resolve(setting, arg1, arg2).map_err(|e| self.handle.fail(e))?;
        debug!("noop engine ignoring setting {}", setting);
        Ok(())
    }

    fn get_stats(&mut self) -> Result<CaptureStats> {
        self.ensure_open("read stats of")?;
        Ok(CaptureStats::default())
    }

    fn get_n_tracepoint_hit(&mut self) -> Result<u64> {
        self.ensure_open("read tracepoint hits of")?;
        Ok(0)
    }

    fn get_n_devs(&self) -> u32 {
        self.handle.num_cpus()
    }

    fn get_threadlist(&mut self) -> Result<Vec<ThreadInfo>> {
        procfs_threads::get_threadlist(&self.host_root).map_err(|e| self.handle.fail(e))
    }

    fn getpid_global(&mut self) -> Result<i64> {
        procfs_threads::getpid_global(&self.host_root).map_err(|e| self.handle.fail(e))
    }

    fn last_error(&self) -> &str {
        self.handle.last_error()
    }
}
