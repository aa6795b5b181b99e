//! Lifecycle controller
//!
//! Drives a [`ProbeManager`] through the ordered acquisition pipeline used by
//! `init` and through the unconditional teardown used by `close`.
//!
//! The pipeline is fail-fast: the first step that fails is propagated and no
//! later step runs. Nothing is rolled back; the caller is expected to `close`
//! the engine, which is safe whatever subset of resources was acquired.

use crate::errors::{EngineError, Result};
use crate::handle::EngineHandle;
use crate::probe_manager::ProbeManager;
use capture_engine_common::Version;
use log::{debug, info, warn};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Allocated,
    Initialized,
    Capturing,
    Stopped,
    Closed,
    /// `init` failed part-way; only `close` remains meaningful.
    Failed,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Allocated => "allocated",
            EngineState::Initialized => "initialized",
            EngineState::Capturing => "capturing",
            EngineState::Stopped => "stopped",
            EngineState::Closed => "closed",
            EngineState::Failed => "failed",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self,
            EngineState::Initialized | EngineState::Capturing | EngineState::Stopped
        )
    }

    /// Fails with `InvalidState` unless `init` has succeeded and `close` has
    /// not run yet.
    pub fn ensure_open(self, operation: &'static str) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                operation,
                state: self,
            })
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One stage of the `init` pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionStep {
    ConfigureLibrary,
    QueryCpus,
    OpenProbe,
    PrepareRingBuffers,
    PrepareMaps,
    LoadProbe,
    FinalizeMaps,
    FinalizeRingBuffers,
    AttachSyscallEnter,
    AttachSyscallExit,
}

impl AcquisitionStep {
    pub const ALL: [AcquisitionStep; 10] = [
        AcquisitionStep::ConfigureLibrary,
        AcquisitionStep::QueryCpus,
        AcquisitionStep::OpenProbe,
        AcquisitionStep::PrepareRingBuffers,
        AcquisitionStep::PrepareMaps,
        AcquisitionStep::LoadProbe,
        AcquisitionStep::FinalizeMaps,
        AcquisitionStep::FinalizeRingBuffers,
        AcquisitionStep::AttachSyscallEnter,
        AcquisitionStep::AttachSyscallExit,
    ];

    /// 1-based position in the pipeline.
    pub fn position(&self) -> usize {
        Self::ALL
            .iter()
            .position(|step| step == self)
            .map_or(0, |index| index + 1)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionStep::ConfigureLibrary => "configure library",
            AcquisitionStep::QueryCpus => "query cpus",
            AcquisitionStep::OpenProbe => "open probe",
            AcquisitionStep::PrepareRingBuffers => "prepare ring buffers",
            AcquisitionStep::PrepareMaps => "prepare maps",
            AcquisitionStep::LoadProbe => "load probe",
            AcquisitionStep::FinalizeMaps => "finalize maps",
            AcquisitionStep::FinalizeRingBuffers => "finalize ring buffers",
            AcquisitionStep::AttachSyscallEnter => "attach syscall enter dispatcher",
            AcquisitionStep::AttachSyscallExit => "attach syscall exit dispatcher",
        }
    }

    fn run<P: ProbeManager + ?Sized>(
        self,
        probe: &mut P,
        handle: &mut EngineHandle,
        verbose: bool,
    ) -> Result<()> {
        match self {
            AcquisitionStep::ConfigureLibrary => probe.set_library_configuration(verbose),
            AcquisitionStep::QueryCpus => {
                handle.record_cpus(probe.cpus_number()?);
                Ok(())
            }
            AcquisitionStep::OpenProbe => probe.open_probe(),
            AcquisitionStep::PrepareRingBuffers => probe.prepare_ringbuf_array_before_loading(),
            AcquisitionStep::PrepareMaps => probe.prepare_maps_before_loading(),
            AcquisitionStep::LoadProbe => probe.load_probe(),
            AcquisitionStep::FinalizeMaps => probe.finalize_maps_after_loading(),
            AcquisitionStep::FinalizeRingBuffers => probe.finalize_ringbuf_array_after_loading(),
            AcquisitionStep::AttachSyscallEnter => probe.attach_syscall_enter_dispatcher(),
            AcquisitionStep::AttachSyscallExit => probe.attach_syscall_exit_dispatcher(),
        }
    }
}

impl fmt::Display for AcquisitionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Versions the loaded probe reports, recorded on the session after `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeVersions {
    pub api: Version,
    pub schema: Version,
}

impl ProbeVersions {
    /// Reported by engines that have no probe behind them.
    pub fn unversioned() -> Self {
        Self {
            api: Version::new(0, 0, 0),
            schema: Version::new(0, 0, 0),
        }
    }
}

/// Runs every acquisition step in order, stopping at the first failure.
pub fn acquire<P: ProbeManager + ?Sized>(
    probe: &mut P,
    handle: &mut EngineHandle,
    verbose: bool,
) -> Result<ProbeVersions> {
    for step in AcquisitionStep::ALL {
        debug!(
            "init step {}/{}: {}",
            step.position(),
            AcquisitionStep::ALL.len(),
            step
        );
        if let Err(err) = step.run(probe, handle, verbose) {
            warn!("init aborted at step {} ({}): {}", step.position(), step, err);
            return Err(err);
        }
    }

    let versions = ProbeVersions {
        api: probe.probe_api_version(),
        schema: probe.probe_schema_version(),
    };
    info!(
        "probe ready on {} cpus (api {}, schema {})",
        handle.num_cpus(),
        versions.api,
        versions.schema
    );
    Ok(versions)
}

/// Detaches everything, then closes the probe. Never assumes what was acquired.
pub fn release<P: ProbeManager + ?Sized>(probe: &mut P) {
    probe.detach_all_programs();
    probe.close_probe();
    debug!("probe released");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_number_steps_from_one_to_ten() {
        assert_eq!(AcquisitionStep::ConfigureLibrary.position(), 1);
        assert_eq!(AcquisitionStep::LoadProbe.position(), 6);
        assert_eq!(AcquisitionStep::AttachSyscallExit.position(), 10);
    }

    #[test]
    fn should_prepare_before_loading_and_finalize_after() {
        let load = AcquisitionStep::LoadProbe.position();

        assert!(AcquisitionStep::PrepareRingBuffers.position() < load);
        assert!(AcquisitionStep::PrepareMaps.position() < load);
        assert!(AcquisitionStep::FinalizeMaps.position() > load);
        assert!(AcquisitionStep::FinalizeRingBuffers.position() > load);
    }

    #[test]
    fn should_report_open_states() {
        assert!(!EngineState::Allocated.is_open());
        assert!(EngineState::Initialized.is_open());
        assert!(EngineState::Capturing.is_open());
        assert!(EngineState::Stopped.is_open());
        assert!(!EngineState::Closed.is_open());
        assert!(!EngineState::Failed.is_open());
    }
}
