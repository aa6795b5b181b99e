//! Instrumented probe manager shared by the integration tests
//!
//! Every call is appended to a log the test keeps a handle on, so the order
//! of backend calls can be asserted even after the manager has been moved
//! into an engine.

#![allow(dead_code)]

use capture_engine::engine::{Engine, ModernBpfEngine, OpenArgs};
use capture_engine::errors::{EngineError, Result};
use capture_engine::probe_manager::ProbeManager;
use capture_engine::{AcquisitionStep, CaptureStats, EventRef};
use capture_engine_common::{ProbeCounters, Version};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Step(AcquisitionStep),
    DetachAll,
    CloseProbe,
    Consume,
    EnableCapture,
    DisableCapture,
    SetSnaplen(u64),
    GetStats,
    GetTracepointHits,
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

pub struct RecordingProbeManager {
    calls: CallLog,
    fail_at: Option<AcquisitionStep>,
    cpus: u32,
    script: VecDeque<Option<(u16, Vec<u8>)>>,
    current: Vec<u8>,
    fail_consume: bool,
    fail_toggle: bool,
    counters: ProbeCounters,
}

impl RecordingProbeManager {
    pub fn new() -> (Self, CallLog) {
        let calls: CallLog = Rc::new(RefCell::new(Vec::new()));
        let manager = Self {
            calls: Rc::clone(&calls),
            fail_at: None,
            cpus: 4,
            script: VecDeque::new(),
            current: Vec::new(),
            fail_consume: false,
            fail_toggle: false,
            counters: ProbeCounters::new(),
        };
        (manager, calls)
    }

    pub fn with_failure_at(mut self, step: AcquisitionStep) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn with_cpus(mut self, cpus: u32) -> Self {
        self.cpus = cpus;
        self
    }

    /// Queues an event produced on `cpu`.
    pub fn with_event(mut self, cpu: u16, data: &[u8]) -> Self {
        self.script.push_back(Some((cpu, data.to_vec())));
        self
    }

    /// Queues one empty poll.
    pub fn with_empty_poll(mut self) -> Self {
        self.script.push_back(None);
        self
    }

    pub fn with_consume_failure(mut self) -> Self {
        self.fail_consume = true;
        self
    }

    pub fn with_toggle_failure(mut self) -> Self {
        self.fail_toggle = true;
        self
    }

    pub fn with_counters(mut self, counters: ProbeCounters) -> Self {
        self.counters = counters;
        self
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn step(&mut self, step: AcquisitionStep) -> Result<()> {
        self.record(Call::Step(step));
        if self.fail_at == Some(step) {
            return Err(EngineError::StepFailed {
                step,
                source: anyhow::anyhow!("injected failure"),
            });
        }
        Ok(())
    }
}

impl ProbeManager for RecordingProbeManager {
    fn set_library_configuration(&mut self, _verbose: bool) -> Result<()> {
        self.step(AcquisitionStep::ConfigureLibrary)
    }

    fn cpus_number(&mut self) -> Result<u32> {
        self.step(AcquisitionStep::QueryCpus)?;
        Ok(self.cpus)
    }

    fn open_probe(&mut self) -> Result<()> {
        self.step(AcquisitionStep::OpenProbe)
    }

    fn prepare_ringbuf_array_before_loading(&mut self) -> Result<()> {
        self.step(AcquisitionStep::PrepareRingBuffers)
    }

    fn prepare_maps_before_loading(&mut self) -> Result<()> {
        self.step(AcquisitionStep::PrepareMaps)
    }

    fn load_probe(&mut self) -> Result<()> {
        self.step(AcquisitionStep::LoadProbe)
    }

    fn finalize_maps_after_loading(&mut self) -> Result<()> {
        self.step(AcquisitionStep::FinalizeMaps)
    }

    fn finalize_ringbuf_array_after_loading(&mut self) -> Result<()> {
        self.step(AcquisitionStep::FinalizeRingBuffers)
    }

    fn attach_syscall_enter_dispatcher(&mut self) -> Result<()> {
        self.step(AcquisitionStep::AttachSyscallEnter)
    }

    fn attach_syscall_exit_dispatcher(&mut self) -> Result<()> {
        self.step(AcquisitionStep::AttachSyscallExit)
    }

    fn detach_all_programs(&mut self) {
        self.record(Call::DetachAll);
    }

    fn close_probe(&mut self) {
        self.record(Call::CloseProbe);
    }

    fn consume_one_from_buffers(&mut self) -> Result<Option<EventRef<'_>>> {
        self.record(Call::Consume);
        if self.fail_consume {
            return Err(EngineError::RetrievalFailed {
                source: anyhow::anyhow!("buffer corrupted"),
            });
        }
        match self.script.pop_front().flatten() {
            Some((cpu, data)) => {
                self.current = data;
                Ok(Some(EventRef {
                    data: &self.current,
                    cpu,
                }))
            }
            None => Ok(None),
        }
    }

    fn enable_capture(&mut self) -> Result<()> {
        self.record(Call::EnableCapture);
        if self.fail_toggle {
            return Err(EngineError::MapNotFound {
                map_name: "SETTINGS".to_string(),
            });
        }
        Ok(())
    }

    fn disable_capture(&mut self) -> Result<()> {
        self.record(Call::DisableCapture);
        if self.fail_toggle {
            return Err(EngineError::MapNotFound {
                map_name: "SETTINGS".to_string(),
            });
        }
        Ok(())
    }

    fn set_snaplen(&mut self, snaplen: u64) -> Result<()> {
        self.record(Call::SetSnaplen(snaplen));
        Ok(())
    }

    fn get_stats(&mut self) -> Result<CaptureStats> {
        self.record(Call::GetStats);
        Ok(CaptureStats::from_counters(&self.counters, 0))
    }

    fn get_n_tracepoint_hit(&mut self) -> Result<u64> {
        self.record(Call::GetTracepointHits);
        Ok(self.counters.n_evts)
    }

    fn probe_api_version(&self) -> Version {
        Version::new(3, 0, 0)
    }

    fn probe_schema_version(&self) -> Version {
        Version::new(2, 1, 0)
    }
}

pub fn open_args() -> OpenArgs {
    OpenArgs::new("modern_bpf")
}

/// Engine over `manager`, not yet initialized.
pub fn engine_with(manager: RecordingProbeManager) -> ModernBpfEngine<RecordingProbeManager> {
    ModernBpfEngine::with_probe_manager(manager, &open_args().probe)
}

/// Engine that went through a successful `init`.
pub fn initialized_engine(
    manager: RecordingProbeManager,
) -> ModernBpfEngine<RecordingProbeManager> {
    let mut engine = engine_with(manager);
    engine
        .init(&open_args())
        .expect("init should succeed with a healthy probe");
    engine
}

pub fn steps(calls: &CallLog) -> Vec<AcquisitionStep> {
    calls
        .borrow()
        .iter()
        .filter_map(|call| match call {
            Call::Step(step) => Some(*step),
            _ => None,
        })
        .collect()
}

pub fn count(calls: &CallLog, wanted: Call) -> usize {
    calls.borrow().iter().filter(|call| **call == wanted).count()
}
