//! Probe management
//!
//! The [`ProbeManager`] trait is the boundary between the engine logic and
//! the kernel: everything that touches eBPF objects, maps or links sits behind
//! it. [`AyaProbeManager`] is the production implementation; tests drive the
//! engine through instrumented stand-ins.

pub mod aya_probe_manager;
pub mod ring_buffers;

pub use aya_probe_manager::AyaProbeManager;
pub use ring_buffers::{CpuRing, PerCpuBuffers, RingRead};

use crate::errors::Result;
use crate::retrieval::EventRef;
use crate::stats::CaptureStats;
use capture_engine_common::Version;

/// Raw operations over the syscall probe and its buffers.
///
/// The acquisition methods are called by the lifecycle controller in the
/// order they are declared here, and never again after one of them fails.
/// `detach_all_programs` and `close_probe` must cope with any subset of the
/// acquisition having happened, including none of it.
pub trait ProbeManager {
    /// Configure the loader library (verbosity, resource limits).
    fn set_library_configuration(&mut self, verbose: bool) -> Result<()>;

    /// Number of available CPUs, online or not.
    fn cpus_number(&mut self) -> Result<u32>;

    fn open_probe(&mut self) -> Result<()>;

    fn prepare_ringbuf_array_before_loading(&mut self) -> Result<()>;

    fn prepare_maps_before_loading(&mut self) -> Result<()>;

    fn load_probe(&mut self) -> Result<()>;

    fn finalize_maps_after_loading(&mut self) -> Result<()>;

    fn finalize_ringbuf_array_after_loading(&mut self) -> Result<()>;

    fn attach_syscall_enter_dispatcher(&mut self) -> Result<()>;

    fn attach_syscall_exit_dispatcher(&mut self) -> Result<()>;

    fn detach_all_programs(&mut self);

    fn close_probe(&mut self);

    /// Pops one event from whichever per-CPU buffer has data.
    ///
    /// `Ok(None)` means every buffer is currently empty.
    fn consume_one_from_buffers(&mut self) -> Result<Option<EventRef<'_>>>;

    fn enable_capture(&mut self) -> Result<()>;

    fn disable_capture(&mut self) -> Result<()>;

    fn set_snaplen(&mut self, snaplen: u64) -> Result<()>;

    fn get_stats(&mut self) -> Result<CaptureStats>;

    fn get_n_tracepoint_hit(&mut self) -> Result<u64>;

    fn probe_api_version(&self) -> Version;

    fn probe_schema_version(&self) -> Version;
}
