//! Live capture through the modern eBPF probe
//!
//! Binds the lifecycle controller, the settings configurator and the
//! retrieval multiplexer to a [`ProbeManager`]. Production code uses the
//! aya-backed manager; tests plug in instrumented ones.

use super::{CaptureMode, Engine, OpenArgs};
use crate::configuration::Probe;
use crate::errors::{EngineError, Result};
use crate::handle::EngineHandle;
use crate::lifecycle::{self, EngineState, ProbeVersions};
use crate::probe_manager::{AyaProbeManager, ProbeManager};
use crate::procfs_threads::{self, ThreadInfo};
use crate::registry::EngineDescriptor;
use crate::retrieval::{self, Retrieved};
use crate::settings;
use crate::stats::CaptureStats;
use log::{debug, info, warn};
use std::path::PathBuf;

pub const MODERN_BPF_ENGINE_NAME: &str = "modern_bpf";

pub static MODERN_BPF_ENGINE: EngineDescriptor = EngineDescriptor {
    name: MODERN_BPF_ENGINE_NAME,
    mode: CaptureMode::Live,
    alloc: alloc_modern_bpf,
};

fn alloc_modern_bpf(args: &OpenArgs) -> Box<dyn Engine> {
    Box::new(ModernBpfEngine::new(&args.probe))
}

pub struct ModernBpfEngine<P = AyaProbeManager> {
    handle: EngineHandle,
    probe: P,
    state: EngineState,
    host_root: PathBuf,
}

impl ModernBpfEngine<AyaProbeManager> {
    pub fn new(options: &Probe) -> Self {
        Self::with_probe_manager(AyaProbeManager::new(options), options)
    }
}

impl<P: ProbeManager> ModernBpfEngine<P> {
    pub fn with_probe_manager(probe: P, options: &Probe) -> Self {
        Self {
            handle: EngineHandle::alloc(),
            probe,
            state: EngineState::Allocated,
            host_root: options.host_root.clone(),
        }
    }

    pub fn probe_manager(&self) -> &P {
        &self.probe
    }

    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    fn ensure_open(&mut self, operation: &'static str) -> Result<()> {
        self.state
            .ensure_open(operation)
            .map_err(|e| self.handle.fail(e))
    }
}

impl<P: ProbeManager> Engine for ModernBpfEngine<P> {
    fn name(&self) -> &'static str {
        MODERN_BPF_ENGINE_NAME
    }

    fn mode(&self) -> CaptureMode {
        CaptureMode::Live
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn init(&mut self, args: &OpenArgs) -> Result<ProbeVersions> {
        if self.state != EngineState::Allocated {
            return Err(self.handle.fail(EngineError::InvalidState {
                operation: "init",
                state: self.state,
            }));
        }

        match lifecycle::acquire(&mut self.probe, &mut self.handle, args.probe.verbose) {
            Ok(versions) => {
                self.state = EngineState::Initialized;
                Ok(versions)
            }
            Err(err) => {
                self.state = EngineState::Failed;
                Err(self.handle.fail(err))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.state == EngineState::Closed {
            return Ok(());
        }
        lifecycle::release(&mut self.probe);
        info!("{} engine closed (was {})", MODERN_BPF_ENGINE_NAME, self.state);
        self.state = EngineState::Closed;
        Ok(())
    }

    fn next(&mut self) -> Result<Retrieved<'_>> {
        self.ensure_open("read events from")?;
        // TODO: merge per-CPU streams by kernel timestamp once the event
        // header layout is shared with user space.
        retrieval::next_event(&mut self.probe).map_err(|e| self.handle.fail(e))
    }

    fn start_capture(&mut self) -> Result<()> {
        if !self.state.is_open() {
            warn!("ignoring start on a {} engine", self.state);
            return Ok(());
        }
        if let Err(err) = self.probe.enable_capture() {
            warn!("failed to enable capture: {}", err);
        }
        self.state = EngineState::Capturing;
        debug!("capture started");
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<()> {
        if !self.state.is_open() {
            warn!("ignoring stop on a {} engine", self.state);
            return Ok(());
        }
        if let Err(err) = self.probe.disable_capture() {
            warn!("failed to disable capture: {}", err);
        }
        self.state = EngineState::Stopped;
        debug!("capture stopped");
        Ok(())
    }

    fn configure(&mut self, setting: u32, arg1: u64, arg2: u64) -> Result<()> {
        if self.state == EngineState::Closed {
            return Err(self.handle.fail(EngineError::InvalidState {
                operation: "configure",
                state: self.state,
            }));
        }
        settings::configure(&mut self.probe, setting, arg1, arg2).map_err(|e| self.handle.fail(e))
    }

    fn get_stats(&mut self) -> Result<CaptureStats> {
        self.ensure_open("read stats of")?;
        self.probe.get_stats().map_err(|e| self.handle.fail(e))
    }

    fn get_n_tracepoint_hit(&mut self) -> Result<u64> {
        self.ensure_open("read tracepoint hits of")?;
        self.probe
            .get_n_tracepoint_hit()
            .map_err(|e| self.handle.fail(e))
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
