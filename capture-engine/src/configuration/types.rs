//! Configuration type definitions
//!
//! Defines the sections a capture configuration is made of. Every section
//! deserializes with defaults so configuration files may be partial.

use crate::engine::modern_bpf::MODERN_BPF_ENGINE_NAME;
use crate::settings::SettingEntry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backend {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    pub object_path: Option<PathBuf>,
    pub verbose: bool,
    /// Pages per CPU buffer; must be a power of two.
    pub buffer_pages: Option<usize>,
    /// Root under which the host's `/proc` is mounted.
    pub host_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capture {
    pub duration_secs: Option<u64>,
    pub max_events: Option<u64>,
    pub poll_interval_ms: u64,
    pub settings: Vec<SettingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Runtime {
    pub config_file: Option<PathBuf>,
}

/// Shape of a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub engine: Backend,
    pub probe: Probe,
    pub capture: Capture,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            name: MODERN_BPF_ENGINE_NAME.to_string(),
        }
    }
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            object_path: None,
            verbose: false,
            buffer_pages: None,
            host_root: PathBuf::from("/"),
        }
    }
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            duration_secs: None,
            max_events: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            settings: Vec::new(),
        }
    }
}
