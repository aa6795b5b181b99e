//! Pluggable syscall capture engines
//!
//! A host opens an engine by name, drives it through `init`, a loop of
//! non-blocking `next` calls and `close`, and can tune it with numeric
//! settings along the way. The `modern_bpf` engine is backed by an eBPF probe
//! loaded with aya; `noop` captures nothing.

pub mod capture_loop;
pub mod cli;
pub mod configuration;
pub mod engine;
pub mod errors;
pub mod handle;
pub mod lifecycle;
pub mod probe_manager;
pub mod procfs_threads;
pub mod registry;
pub mod report;
pub mod retrieval;
pub mod session;
pub mod settings;
pub mod stats;

pub use capture_loop::{CaptureLoop, CaptureSummary};
pub use cli::Args;
pub use configuration::Configuration;
pub use engine::{CaptureMode, Engine, OpenArgs};
pub use errors::{EngineError, Result};
pub use lifecycle::{AcquisitionStep, EngineState, ProbeVersions};
pub use probe_manager::ProbeManager;
pub use report::{CaptureReport, ReportGenerator};
pub use retrieval::{EventRef, Retrieved};
pub use session::CaptureSession;
pub use settings::{Setting, SettingEntry};
pub use stats::CaptureStats;
