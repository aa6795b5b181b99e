//! Configuration Builder
//!
//! Provides a builder pattern for constructing Configuration instances
//! from multiple sources with proper validation.

use super::{Backend, Capture, Configuration, FileConfig, Probe, Runtime};
use crate::errors::EngineError;
use crate::settings::{Setting, SettingEntry};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the engine name.
pub const ENGINE_ENV: &str = "CAPTURE_ENGINE";
/// Environment variable pointing at the host root filesystem.
pub const HOST_ROOT_ENV: &str = "HOST_ROOT";

/// Builder for creating Configuration instances
///
/// Later sources override earlier ones:
/// - Defaults
/// - Configuration files
/// - Environment variables
/// - CLI arguments
#[derive(Debug)]
pub struct ConfigurationBuilder {
    engine: Backend,
    probe: Probe,
    capture: Capture,
    runtime: Runtime,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self {
            engine: Backend::default(),
            probe: Probe::default(),
            capture: Capture::default(),
            runtime: Runtime::default(),
        }
    }

    pub fn engine_name(mut self, name: &str) -> Self {
        self.engine.name = name.to_string();
        self
    }

    pub fn probe_object<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.probe.object_path = Some(path.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.probe.verbose = verbose;
        self
    }

    pub fn buffer_pages(mut self, pages: usize) -> Self {
        self.probe.buffer_pages = Some(pages);
        self
    }

    pub fn host_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.probe.host_root = root.into();
        self
    }

    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.capture.duration_secs = Some(secs);
        self
    }

    pub fn max_events(mut self, max: u64) -> Self {
        self.capture.max_events = Some(max);
        self
    }

    pub fn poll_interval_ms(mut self, interval: u64) -> Self {
        self.capture.poll_interval_ms = interval;
        self
    }

    pub fn setting(mut self, entry: SettingEntry) -> Self {
        self.capture.settings.push(entry);
        self
    }

    /// Configure from CLI arguments (Vec<String> format for testing)
    pub fn from_cli_args(mut self, args: &[&str]) -> Result<Self, EngineError> {
        let mut i = 0;
        while i < args.len() {
            match args[i] {
                "--engine" | "-e" => {
                    let value = required_value(args, i)?;
                    self = self.engine_name(value);
                    i += 2;
                }
                "--probe" | "-p" => {
                    let value = required_value(args, i)?;
                    self = self.probe_object(value);
                    i += 2;
                }
                "--duration" | "-d" => {
                    let value = parse_value(args, i)?;
                    self = self.duration_secs(value);
                    i += 2;
                }
                "--max-events" | "-n" => {
                    let value = parse_value(args, i)?;
                    self = self.max_events(value);
                    i += 2;
                }
                "--snaplen" | "-s" => {
                    let value = parse_value(args, i)?;
                    self = self.setting(SettingEntry::new(Setting::Snaplen, value, 0));
                    i += 2;
                }
                "--buffer-pages" => {
                    let value = parse_value(args, i)?;
                    self = self.buffer_pages(value as usize);
                    i += 2;
                }
                "--host-root" => {
                    let value = required_value(args, i)?;
                    self = self.host_root(value);
                    i += 2;
                }
                "--verbose" | "-v" => {
                    self = self.verbose(true);
                    i += 1;
                }
                _ => {
                    i += 1; // Skip unknown arguments for now
                }
            }
        }

        Ok(self)
    }

    /// Configure from a YAML, JSON or TOML file, picked by extension
    pub fn from_config_file<P: AsRef<Path>>(self, path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| EngineError::ConfigError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let mut builder = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => self.from_json_str(&content)?,
            Some("toml") => self.from_toml_str(&content)?,
            _ if content.trim_start().starts_with('{') => self.from_json_str(&content)?,
            _ => self.from_yaml_str(&content)?,
        };

        builder.runtime.config_file = Some(path.to_path_buf());
        Ok(builder)
    }

    pub fn from_yaml_str(self, yaml: &str) -> Result<Self, EngineError> {
        let config: FileConfig =
            serde_yaml::from_str(yaml).map_err(|e| EngineError::ConfigError {
                message: format!("Failed to parse YAML config: {}", e),
            })?;
        Ok(self.merge(config))
    }

    pub fn from_json_str(self, json: &str) -> Result<Self, EngineError> {
        let config: FileConfig =
            serde_json::from_str(json).map_err(|e| EngineError::ConfigError {
                message: format!("Failed to parse JSON config: {}", e),
            })?;
        Ok(self.merge(config))
    }

    pub fn from_toml_str(self, text: &str) -> Result<Self, EngineError> {
        let config: FileConfig = toml::from_str(text).map_err(|e| EngineError::ConfigError {
            message: format!("Failed to parse TOML config: {}", e),
        })?;
        Ok(self.merge(config))
    }

    /// Configure from environment variables
    pub fn from_environment(self) -> Result<Self, EngineError> {
        self.from_env_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_env_lookup<F>(mut self, lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENGINE_ENV).filter(|name| !name.is_empty()) {
            self = self.engine_name(&name);
        }
        if let Some(root) = lookup(HOST_ROOT_ENV).filter(|root| !root.is_empty()) {
            self = self.host_root(root);
        }
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(self) -> Result<Configuration, EngineError> {
        let config = Configuration {
            engine: self.engine,
            probe: self.probe,
            capture: self.capture,
            runtime: self.runtime,
        };

        config.validate()?;
        Ok(config)
    }

    fn merge(mut self, config: FileConfig) -> Self {
        self.engine = config.engine;
        self.probe = config.probe;
        self.capture = config.capture;
        self
    }
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn required_value<'a>(args: &[&'a str], i: usize) -> Result<&'a str, EngineError> {
    args.get(i + 1).copied().ok_or_else(|| EngineError::ConfigError {
        message: format!("Missing value for {}", args[i]),
    })
}

fn parse_value(args: &[&str], i: usize) -> Result<u64, EngineError> {
    let value = required_value(args, i)?;
    value.parse().map_err(|_| EngineError::ConfigError {
        message: format!("Invalid value for {}: {}", args[i], value),
    })
}
