#![no_std]

#[cfg(test)]
extern crate std;

use core::fmt;

/// Per-CPU perf event array the probe publishes syscall records into.
pub const EVENTS_MAP: &str = "EVENTS";
/// Per-CPU array (single slot) of [`ProbeCounters`].
pub const COUNTERS_MAP: &str = "COUNTERS";
/// Array (single slot) of [`ProbeSettings`] read by the probe on every hit.
pub const SETTINGS_MAP: &str = "SETTINGS";

/// Global holding the wall-clock boot time, in nanoseconds since the epoch.
pub const BOOT_TIME_GLOBAL: &str = "BOOT_TIME";

/// Raw tracepoint program run on syscall entry.
pub const SYS_ENTER_PROGRAM: &str = "sys_enter";
/// Raw tracepoint program run on syscall exit.
pub const SYS_EXIT_PROGRAM: &str = "sys_exit";

/// Snaplen the probe starts with until a `Snaplen` setting is applied.
pub const DEFAULT_SNAPLEN: u32 = 80;

pub const PROBE_API_VERSION: Version = Version::new(3, 0, 0);
pub const PROBE_SCHEMA_VERSION: Version = Version::new(2, 1, 0);

/// Counters each CPU bumps from inside the probe.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProbeCounters {
    pub n_evts: u64,
    pub n_drops_buffer: u64,
    pub n_drops_max_event_size: u64,
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for ProbeCounters {}

impl ProbeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, n_evts: u64) -> Self {
        self.n_evts = n_evts;
        self
    }

    pub fn with_buffer_drops(mut self, drops: u64) -> Self {
        self.n_drops_buffer = drops;
        self
    }

    pub fn with_max_event_size_drops(mut self, drops: u64) -> Self {
        self.n_drops_max_event_size = drops;
        self
    }

    /// Folds another CPU's counters into this one.
    pub fn accumulate(&mut self, other: &ProbeCounters) {
        self.n_evts = self.n_evts.wrapping_add(other.n_evts);
        self.n_drops_buffer = self.n_drops_buffer.wrapping_add(other.n_drops_buffer);
        self.n_drops_max_event_size = self
            .n_drops_max_event_size
            .wrapping_add(other.n_drops_max_event_size);
    }

    pub fn total_drops(&self) -> u64 {
        self.n_drops_buffer
            .wrapping_add(self.n_drops_max_event_size)
    }
}

/// Runtime knobs shared between user space and the probe.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeSettings {
    pub snaplen: u32,
    pub capture_enabled: u32,
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for ProbeSettings {}

impl ProbeSettings {
    pub fn new() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            capture_enabled: 0,
        }
    }

    pub fn with_snaplen(mut self, snaplen: u32) -> Self {
        self.snaplen = snaplen;
        self
    }

    pub fn with_capture(mut self, enabled: bool) -> Self {
        self.capture_enabled = enabled as u32;
        self
    }

    pub fn is_capture_enabled(&self) -> bool {
        self.capture_enabled != 0
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Semantic version of the probe API or event schema.
///
/// Packed as `major << 44 | minor << 24 | patch`, leaving 20 bits for the
/// minor and 24 bits for the patch component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

const MINOR_SHIFT: u32 = 24;
const MAJOR_SHIFT: u32 = 44;
const MINOR_MASK: u64 = (1 << (MAJOR_SHIFT - MINOR_SHIFT)) - 1;
const PATCH_MASK: u64 = (1 << MINOR_SHIFT) - 1;

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub const fn encode(&self) -> u64 {
        ((self.major as u64) << MAJOR_SHIFT)
            | (((self.minor as u64) & MINOR_MASK) << MINOR_SHIFT)
            | ((self.patch as u64) & PATCH_MASK)
    }

    pub const fn decode(raw: u64) -> Self {
        Self {
            major: (raw >> MAJOR_SHIFT) as u32,
            minor: ((raw >> MINOR_SHIFT) & MINOR_MASK) as u32,
            patch: (raw & PATCH_MASK) as u32,
        }
    }

    /// Same major and at least the requested minor/patch.
    pub fn is_compatible_with(&self, required: &Version) -> bool {
        self.major == required.major && self >= required
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
