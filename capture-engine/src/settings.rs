//! Settings configurator
//!
//! Runtime settings arrive as a raw tag plus two numeric arguments. Tags
//! outside [`Setting`] are rejected; every known setting is either forwarded
//! to the probe or accepted as a no-op, so the same settings vector can be
//! applied to any engine.

use crate::errors::{EngineError, Result};
use crate::probe_manager::ProbeManager;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Setting {
    SamplingRatio = 0,
    TracersCapture = 1,
    PageFaults = 2,
    Snaplen = 3,
    EventMask = 4,
    DynamicSnaplen = 5,
    SimpleDriverMode = 6,
    FullcapturePortRange = 7,
    StatsdPort = 8,
}

impl Setting {
    pub const ALL: [Setting; 9] = [
        Setting::SamplingRatio,
        Setting::TracersCapture,
        Setting::PageFaults,
        Setting::Snaplen,
        Setting::EventMask,
        Setting::DynamicSnaplen,
        Setting::SimpleDriverMode,
        Setting::FullcapturePortRange,
        Setting::StatsdPort,
    ];

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Setting::SamplingRatio => "sampling_ratio",
            Setting::TracersCapture => "tracers_capture",
            Setting::PageFaults => "page_faults",
            Setting::Snaplen => "snaplen",
            Setting::EventMask => "event_mask",
            Setting::DynamicSnaplen => "dynamic_snaplen",
            Setting::SimpleDriverMode => "simple_driver_mode",
            Setting::FullcapturePortRange => "fullcapture_port_range",
            Setting::StatsdPort => "statsd_port",
        }
    }
}

impl TryFrom<u32> for Setting {
    type Error = u32;

    fn try_from(raw: u32) -> std::result::Result<Self, Self::Error> {
        Setting::ALL
            .into_iter()
            .find(|setting| setting.raw() == raw)
            .ok_or(raw)
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A setting with its two arguments, as carried in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub setting: Setting,
    #[serde(default)]
    pub arg1: u64,
    #[serde(default)]
    pub arg2: u64,
}

impl SettingEntry {
    pub fn new(setting: Setting, arg1: u64, arg2: u64) -> Self {
        Self {
            setting,
            arg1,
            arg2,
        }
    }
}

/// Resolves a raw tag, producing the diagnostic for unknown ones.
pub fn resolve(setting: u32, arg1: u64, arg2: u64) -> Result<Setting> {
    Setting::try_from(setting).map_err(|setting| EngineError::UnknownSetting {
        setting,
        arg1,
        arg2,
    })
}

/// Applies a setting to a probe-backed engine.
///
/// Only `Snaplen` reaches the probe, with `arg1` as the new length.
pub fn configure<P: ProbeManager + ?Sized>(
    probe: &mut P,
    setting: u32,
    arg1: u64,
    arg2: u64,
) -> Result<()> {
    match resolve(setting, arg1, arg2)? {
        Setting::Snaplen => probe.set_snaplen(arg1),
        unsupported @ (Setting::SamplingRatio
        | Setting::TracersCapture
        | Setting::PageFaults
        | Setting::EventMask
        | Setting::DynamicSnaplen
        | Setting::SimpleDriverMode
        | Setting::FullcapturePortRange
        | Setting::StatsdPort) => {
            debug!("setting {} not supported, ignoring (args {}, {})", unsupported, arg1, arg2);
            Ok(())
        }
    }
}
