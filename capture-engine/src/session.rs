//! Capture session
//!
//! Host-side wrapper that selects an engine by name, brings it up and keeps
//! the probe versions it reported. Dropping a session closes its engine.

use crate::engine::{Engine, OpenArgs};
use crate::errors::Result;
use crate::lifecycle::{EngineState, ProbeVersions};
use crate::procfs_threads::ThreadInfo;
use crate::registry;
use crate::retrieval::Retrieved;
use crate::settings::SettingEntry;
use crate::stats::CaptureStats;
use log::{debug, error, info, warn};
use std::fmt;

pub struct CaptureSession {
    engine: Box<dyn Engine>,
    versions: ProbeVersions,
}

impl CaptureSession {
    /// Looks the engine up by name, allocates it and runs `init`.
    pub fn open(args: &OpenArgs) -> Result<Self> {
        let descriptor = registry::find(&args.engine_name)?;
        Self::open_with(descriptor.alloc(args), args)
    }

    /// Runs `init` on an already allocated engine.
    ///
    /// When `init` fails part way the engine is closed before the error is
    /// returned, releasing whatever part of the probe had been acquired. An
    /// engine refused for being in the wrong state is left untouched.
    pub fn open_with(mut engine: Box<dyn Engine>, args: &OpenArgs) -> Result<Self> {
        match engine.init(args) {
            Ok(versions) => {
                info!(
                    "opened {} engine (api {}, schema {})",
                    engine.name(),
                    versions.api,
                    versions.schema
                );
                Ok(Self { engine, versions })
            }
            Err(err) => {
                error!("{} engine init failed: {}", engine.name(), engine.last_error());
                if engine.state() == EngineState::Failed {
                    if let Err(close_err) = engine.close() {
                        warn!("close after failed init: {}", close_err);
                    }
                }
                Err(err)
            }
        }
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> &mut dyn Engine {
        self.engine.as_mut()
    }

    pub fn versions(&self) -> ProbeVersions {
        self.versions
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn num_cpus(&self) -> u32 {
        self.engine.get_n_devs()
    }

    /// Applies every entry in order, stopping at the first rejected one.
    pub fn apply_settings(&mut self, entries: &[SettingEntry]) -> Result<()> {
        for entry in entries {
            debug!("applying {} ({}, {})", entry.setting, entry.arg1, entry.arg2);
            self.engine
                .configure(entry.setting.raw(), entry.arg1, entry.arg2)?;
        }
        Ok(())
    }

    pub fn configure(&mut self, setting: u32, arg1: u64, arg2: u64) -> Result<()> {
        self.engine.configure(setting, arg1, arg2)
    }

    pub fn start(&mut self) -> Result<()> {
        self.engine.start_capture()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.engine.stop_capture()
    }

    pub fn next(&mut self) -> Result<Retrieved<'_>> {
        self.engine.next()
    }

    pub fn stats(&mut self) -> Result<CaptureStats> {
        self.engine.get_stats()
    }

    pub fn tracepoint_hits(&mut self) -> Result<u64> {
        self.engine.get_n_tracepoint_hit()
    }

    pub fn threads(&mut self) -> Result<Vec<ThreadInfo>> {
        self.engine.get_threadlist()
    }

    pub fn last_error(&self) -> &str {
        self.engine.last_error()
    }

    pub fn close(mut self) -> Result<()> {
        self.engine.close()
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("engine", &self.engine.name())
            .field("state", &self.engine.state())
            .field("versions", &self.versions)
            .finish()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.engine.state() != EngineState::Closed {
            if let Err(err) = self.engine.close() {
                warn!("failed to close {} engine: {}", self.engine.name(), err);
            }
        }
    }
}
