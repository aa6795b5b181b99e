//! Configuration validation logic

use super::Configuration;
use crate::errors::EngineError;
use crate::settings::Setting;

impl Configuration {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.validate_engine_name()?;
        self.validate_buffer_pages()?;
        self.validate_capture_limits()?;
        self.validate_settings()?;
        Ok(())
    }

    pub fn validate_engine_name(&self) -> Result<(), EngineError> {
        if self.engine.name.trim().is_empty() {
            return Err(EngineError::ConfigError {
                message: "Engine name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Buffer pages must be a non-zero power of two
    pub fn validate_buffer_pages(&self) -> Result<(), EngineError> {
        if let Some(pages) = self.probe.buffer_pages {
            if !pages.is_power_of_two() {
                return Err(EngineError::ConfigError {
                    message: format!("Buffer pages must be a power of two, got {}", pages),
                });
            }
        }
        Ok(())
    }

    pub fn validate_capture_limits(&self) -> Result<(), EngineError> {
        if self.capture.poll_interval_ms == 0 {
            return Err(EngineError::ConfigError {
                message: "Poll interval must be at least 1ms".to_string(),
            });
        }
        if self.capture.duration_secs == Some(0) {
            return Err(EngineError::ConfigError {
                message: "Duration must be at least 1 second".to_string(),
            });
        }
        if self.capture.max_events == Some(0) {
            return Err(EngineError::ConfigError {
                message: "Max events must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Snaplen is stored as a u32 by the probe
    pub fn validate_settings(&self) -> Result<(), EngineError> {
        for entry in &self.capture.settings {
            if entry.setting == Setting::Snaplen && entry.arg1 > u64::from(u32::MAX) {
                return Err(EngineError::ConfigError {
                    message: format!("Snaplen {} exceeds {}", entry.arg1, u32::MAX),
                });
            }
        }
        Ok(())
    }
}
