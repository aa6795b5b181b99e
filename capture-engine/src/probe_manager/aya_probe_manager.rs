//! Syscall probe manager backed by aya
//!
//! Loads the probe object, wires the per-CPU perf buffers and the
//! counters/settings maps, and attaches the `sys_enter` / `sys_exit` raw
//! tracepoints that dispatch every syscall to the probe.

use super::ring_buffers::{detect_online_cpus, PerCpuBuffers};
use super::ProbeManager;
use crate::configuration::Probe;
use crate::errors::{EngineError, Result};
use crate::lifecycle::AcquisitionStep;
use crate::retrieval::EventRef;
use crate::stats::CaptureStats;
use aya::maps::{Array, MapData, PerCpuArray, PerfEventArray};
use aya::programs::raw_trace_point::RawTracePointLinkId;
use aya::programs::RawTracePoint;
use aya::util::nr_cpus;
use aya::{Ebpf, EbpfLoader, VerifierLogLevel};
use aya_log::EbpfLogger;
use capture_engine_common::{
    ProbeCounters, ProbeSettings, Version, BOOT_TIME_GLOBAL, COUNTERS_MAP, EVENTS_MAP,
    PROBE_API_VERSION, PROBE_SCHEMA_VERSION, SETTINGS_MAP, SYS_ENTER_PROGRAM, SYS_EXIT_PROGRAM,
};
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

pub struct AyaProbeManager {
    object_path: Option<PathBuf>,
    buffer_pages: Option<usize>,
    verifier_log: VerifierLogLevel,
    attach_logger: bool,
    num_cpus: u32,
    online_cpus: Vec<u32>,
    boot_time_ns: u64,
    staged: ProbeSettings,
    object: Option<Vec<u8>>,
    ebpf: Option<Ebpf>,
    events: Option<PerfEventArray<MapData>>,
    counters: Option<PerCpuArray<MapData, ProbeCounters>>,
    settings: Option<Array<MapData, ProbeSettings>>,
    buffers: PerCpuBuffers,
    links: Vec<(&'static str, RawTracePointLinkId)>,
}

impl AyaProbeManager {
    pub fn new(options: &Probe) -> Self {
        Self {
            object_path: options.object_path.clone(),
            buffer_pages: options.buffer_pages,
            verifier_log: VerifierLogLevel::default(),
            attach_logger: false,
            num_cpus: 0,
            online_cpus: Vec::new(),
            boot_time_ns: 0,
            staged: ProbeSettings::new(),
            object: None,
            ebpf: None,
            events: None,
            counters: None,
            settings: None,
            buffers: PerCpuBuffers::new(),
            links: Vec::new(),
        }
    }

    fn loaded(&mut self, step: AcquisitionStep) -> Result<&mut Ebpf> {
        self.ebpf
            .as_mut()
            .ok_or_else(|| EngineError::step(step, anyhow::anyhow!("probe is not loaded")))
    }

    fn attach_dispatcher(&mut self, step: AcquisitionStep, program_name: &'static str) -> Result<()> {
        let ebpf = self.loaded(step)?;
        let program: &mut RawTracePoint = ebpf
            .program_mut(program_name)
            .ok_or_else(|| EngineError::ProgramNotFound {
                program_name: program_name.to_string(),
            })?
            .try_into()
            .map_err(|e| EngineError::EbpfAttachmentFailed {
                program_name: program_name.to_string(),
                source: anyhow::anyhow!("Failed to convert to RawTracePoint: {:?}", e),
            })?;

        let link = program
            .attach(program_name)
            .map_err(|e| EngineError::EbpfAttachmentFailed {
                program_name: program_name.to_string(),
                source: anyhow::anyhow!("Attach failed: {:?}", e),
            })?;

        info!("Attached raw tracepoint {}", program_name);
        self.links.push((program_name, link));
        Ok(())
    }

    /// Pushes the staged settings into the probe once its map exists.
    fn sync_settings(&mut self) -> Result<()> {
        if let Some(map) = self.settings.as_mut() {
            map.set(0, self.staged, 0)
                .map_err(|e| EngineError::step(AcquisitionStep::FinalizeMaps, e))?;
        }
        Ok(())
    }

    fn sum_counters(&self) -> Result<ProbeCounters> {
        let map = self
            .counters
            .as_ref()
            .ok_or_else(|| EngineError::StatsUnavailable {
                source: anyhow::anyhow!("probe counters are not available"),
            })?;
        let per_cpu = map
            .get(&0, 0)
            .map_err(|e| EngineError::StatsUnavailable { source: e.into() })?;

        let mut total = ProbeCounters::new();
        for counters in per_cpu.iter() {
            total.accumulate(counters);
        }
        Ok(total)
    }
}

impl ProbeManager for AyaProbeManager {
    fn set_library_configuration(&mut self, verbose: bool) -> Result<()> {
        // Older kernels charge eBPF maps against RLIMIT_MEMLOCK instead of
        // memcg, see https://lwn.net/Articles/837122/
        let rlim = libc::rlimit {
            rlim_cur: libc::RLIM_INFINITY,
            rlim_max: libc::RLIM_INFINITY,
        };
        let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
        if ret != 0 {
            warn!(
                "remove limit on locked memory failed: {}",
                io::Error::last_os_error()
            );
        }

        self.verifier_log = if verbose {
            VerifierLogLevel::VERBOSE | VerifierLogLevel::STATS
        } else {
            VerifierLogLevel::default()
        };
        self.attach_logger = verbose;
        Ok(())
    }

    fn cpus_number(&mut self) -> Result<u32> {
        let cpus = nr_cpus().map_err(|e| {
            EngineError::step(
                AcquisitionStep::QueryCpus,
                anyhow::anyhow!("Failed to read possible CPUs: {:?}", e),
            )
        })?;
        self.num_cpus = u32::try_from(cpus)
            .map_err(|e| EngineError::step(AcquisitionStep::QueryCpus, e))?;
        Ok(self.num_cpus)
    }

    fn open_probe(&mut self) -> Result<()> {
        let step = AcquisitionStep::OpenProbe;
        let path = self.object_path.as_ref().ok_or_else(|| {
            EngineError::step(step, anyhow::anyhow!("no probe object path configured"))
        })?;
        let object = fs::read(path).map_err(|e| {
            EngineError::step(
                step,
                anyhow::anyhow!("Failed to read {}: {}", path.display(), e),
            )
        })?;
        if !object.starts_with(ELF_MAGIC) {
            return Err(EngineError::step(
                step,
                anyhow::anyhow!("{} is not an ELF object", path.display()),
            ));
        }

        debug!("read {} bytes of probe object from {}", object.len(), path.display());
        self.object = Some(object);
        Ok(())
    }

    fn prepare_ringbuf_array_before_loading(&mut self) -> Result<()> {
        if self.num_cpus == 0 {
            return Err(EngineError::step(
                AcquisitionStep::PrepareRingBuffers,
                anyhow::anyhow!("no CPUs to allocate buffers for"),
            ));
        }
        if let Some(pages) = self.buffer_pages {
            if !pages.is_power_of_two() {
                return Err(EngineError::step(
                    AcquisitionStep::PrepareRingBuffers,
                    anyhow::anyhow!("buffer page count {} is not a power of two", pages),
                ));
            }
        }

        self.online_cpus = detect_online_cpus();
        self.buffers = PerCpuBuffers::new();
        debug!(
            "sizing {} for {} cpus ({} online)",
            EVENTS_MAP,
            self.num_cpus,
            self.online_cpus.len()
        );
        Ok(())
    }

    fn prepare_maps_before_loading(&mut self) -> Result<()> {
        self.boot_time_ns = boot_time_ns()
            .map_err(|e| EngineError::step(AcquisitionStep::PrepareMaps, e))?;
        self.staged = self.staged.with_capture(false);
        Ok(())
    }

    fn load_probe(&mut self) -> Result<()> {
        let object = self.object.take().ok_or_else(|| {
            EngineError::step(AcquisitionStep::LoadProbe, anyhow::anyhow!("probe is not open"))
        })?;
        let boot_time_ns = self.boot_time_ns;

        let mut ebpf = EbpfLoader::new()
            .verifier_log_level(self.verifier_log)
            .set_max_entries(EVENTS_MAP, self.num_cpus)
            .set_global(BOOT_TIME_GLOBAL, &boot_time_ns, false)
            .load(&object)
            .map_err(|e| EngineError::EbpfLoadFailed {
                program_name: "probe object".to_string(),
                source: e.into(),
            })?;

        for program_name in [SYS_ENTER_PROGRAM, SYS_EXIT_PROGRAM] {
            let program: &mut RawTracePoint = ebpf
                .program_mut(program_name)
                .ok_or_else(|| EngineError::ProgramNotFound {
                    program_name: program_name.to_string(),
                })?
                .try_into()
                .map_err(|e| EngineError::EbpfLoadFailed {
                    program_name: program_name.to_string(),
                    source: anyhow::anyhow!("Failed to convert to RawTracePoint: {:?}", e),
                })?;

            program.load().map_err(|e| EngineError::EbpfLoadFailed {
                program_name: program_name.to_string(),
                source: anyhow::anyhow!("Load failed: {:?}", e),
            })?;
        }

        if self.attach_logger {
            if let Err(e) = EbpfLogger::init(&mut ebpf) {
                warn!("failed to initialize eBPF logger: {e}");
            }
        }

        self.ebpf = Some(ebpf);
        Ok(())
    }

    fn finalize_maps_after_loading(&mut self) -> Result<()> {
        let step = AcquisitionStep::FinalizeMaps;
        let ebpf = self.loaded(step)?;

        let counters = ebpf
            .take_map(COUNTERS_MAP)
            .ok_or_else(|| EngineError::MapNotFound {
                map_name: COUNTERS_MAP.to_string(),
            })?;
        let counters: PerCpuArray<MapData, ProbeCounters> =
            PerCpuArray::try_from(counters).map_err(|e| EngineError::step(step, e))?;

        let settings = ebpf
            .take_map(SETTINGS_MAP)
            .ok_or_else(|| EngineError::MapNotFound {
                map_name: SETTINGS_MAP.to_string(),
            })?;
        let settings: Array<MapData, ProbeSettings> =
            Array::try_from(settings).map_err(|e| EngineError::step(step, e))?;

        self.counters = Some(counters);
        self.settings = Some(settings);
        self.sync_settings()
    }

    fn finalize_ringbuf_array_after_loading(&mut self) -> Result<()> {
        let step = AcquisitionStep::FinalizeRingBuffers;
        let ebpf = self.loaded(step)?;

        let events = ebpf
            .take_map(EVENTS_MAP)
            .ok_or_else(|| EngineError::MapNotFound {
                map_name: EVENTS_MAP.to_string(),
            })?;
        let mut events: PerfEventArray<MapData> =
            PerfEventArray::try_from(events).map_err(|e| EngineError::step(step, e))?;

        for &cpu in &self.online_cpus {
            let buffer = match events.open(cpu, self.buffer_pages) {
                Ok(buffer) => buffer,
                Err(e) => {
                    warn!("Failed to open perf buffer for CPU {}: {}", cpu, e);
                    continue;
                }
            };
            self.buffers.push(cpu, buffer)?;
        }

        if self.buffers.is_empty() {
            return Err(EngineError::step(
                step,
                anyhow::anyhow!("could not open a buffer on any online CPU"),
            ));
        }
        self.events = Some(events);
        Ok(())
    }

    fn attach_syscall_enter_dispatcher(&mut self) -> Result<()> {
        self.attach_dispatcher(AcquisitionStep::AttachSyscallEnter, SYS_ENTER_PROGRAM)
    }

    fn attach_syscall_exit_dispatcher(&mut self) -> Result<()> {
        self.attach_dispatcher(AcquisitionStep::AttachSyscallExit, SYS_EXIT_PROGRAM)
    }

    fn detach_all_programs(&mut self) {
        let links = std::mem::take(&mut self.links);
        let Some(ebpf) = self.ebpf.as_mut() else {
            return;
        };

        for (program_name, link) in links {
            let program: Option<&mut RawTracePoint> = ebpf
                .program_mut(program_name)
                .and_then(|program| program.try_into().ok());
            match program.map(|program| program.detach(link)) {
                Some(Ok(())) => info!("Detached raw tracepoint {}", program_name),
                Some(Err(e)) => warn!("Failed to detach {}: {:?}", program_name, e),
                None => warn!("Program {} vanished before detach", program_name),
            }
        }
    }

    fn close_probe(&mut self) {
        self.buffers.clear();
        self.events = None;
        self.counters = None;
        self.settings = None;
        self.ebpf = None;
        self.object = None;
        self.staged = self.staged.with_capture(false);
    }

    fn consume_one_from_buffers(&mut self) -> Result<Option<EventRef<'_>>> {
        self.buffers.consume_one()
    }

    fn enable_capture(&mut self) -> Result<()> {
        self.staged = self.staged.with_capture(true);
        self.sync_settings()
    }

    fn disable_capture(&mut self) -> Result<()> {
        self.staged = self.staged.with_capture(false);
        self.sync_settings()
    }

    fn set_snaplen(&mut self, snaplen: u64) -> Result<()> {
        self.staged = self
            .staged
            .with_snaplen(u32::try_from(snaplen).unwrap_or(u32::MAX));
        self.sync_settings()
    }

    fn get_stats(&mut self) -> Result<CaptureStats> {
        let counters = self.sum_counters()?;
        Ok(CaptureStats::from_counters(&counters, self.buffers.lost()))
    }

    fn get_n_tracepoint_hit(&mut self) -> Result<u64> {
        Ok(self.sum_counters()?.n_evts)
    }

    fn probe_api_version(&self) -> Version {
        PROBE_API_VERSION
    }

    fn probe_schema_version(&self) -> Version {
        PROBE_SCHEMA_VERSION
    }
}

/// Wall-clock time of boot, so the probe can stamp events in epoch time.
fn boot_time_ns() -> anyhow::Result<u64> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
    let mut since_boot = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let ret = unsafe { libc::clock_gettime(libc::CLOCK_BOOTTIME, &mut since_boot) };
    if ret != 0 {
        return Err(io::Error::last_os_error().into());
    }
    let since_boot_ns = (since_boot.tv_sec as u64)
        .saturating_mul(1_000_000_000)
        .saturating_add(since_boot.tv_nsec as u64);
    Ok((now.as_nanos() as u64).saturating_sub(since_boot_ns))
}
