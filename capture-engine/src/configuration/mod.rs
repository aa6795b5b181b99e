//! Unified Configuration System
//!
//! Combines settings from CLI arguments, configuration files and environment
//! variables into a single validated configuration object.
//!
//! # Basic Usage
//!
//! ```rust
//! use capture_engine::configuration::Configuration;
//!
//! let config = Configuration::builder()
//!     .from_cli_args(&["--engine", "noop", "--snaplen", "256"])
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.engine.name, "noop");
//! assert_eq!(config.capture.settings.len(), 1);
//! ```

pub mod builder;
pub mod types;
mod validation;

pub use builder::ConfigurationBuilder;
pub use types::*;

use crate::engine::OpenArgs;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Configuration {
    pub engine: Backend,
    pub probe: Probe,
    pub capture: Capture,
    pub runtime: Runtime,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Arguments handed to the engine at open time.
    pub fn open_args(&self) -> OpenArgs {
        OpenArgs {
            engine_name: self.engine.name.clone(),
            probe: self.probe.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.capture.poll_interval_ms)
    }

    pub fn capture_duration(&self) -> Option<Duration> {
        self.capture.duration_secs.map(Duration::from_secs)
    }

    pub fn is_verbose(&self) -> bool {
        self.probe.verbose
    }
}
