use std::path::PathBuf;

use clap::Parser;

use crate::configuration::{Configuration, ConfigurationBuilder};
use crate::errors::EngineError;
use crate::settings::{Setting, SettingEntry};

#[derive(Debug, Clone, Parser)]
#[clap(name = "capture-engine", about = "Syscall capture through pluggable engines")]
pub struct Args {
    #[clap(short, long, help = "Engine to open (modern_bpf, noop)")]
    pub engine: Option<String>,

    #[clap(short, long, help = "Path to the compiled probe object")]
    pub probe: Option<PathBuf>,

    #[clap(short, long, help = "Duration to capture in seconds")]
    pub duration: Option<u64>,

    #[clap(short = 'n', long, help = "Stop after this many events")]
    pub max_events: Option<u64>,

    #[clap(short, long, help = "Maximum captured payload size per event")]
    pub snaplen: Option<u64>,

    #[clap(long, help = "Pages per CPU buffer (power of two)")]
    pub buffer_pages: Option<usize>,

    #[clap(long, help = "Root of the host filesystem")]
    pub host_root: Option<PathBuf>,

    #[clap(short, long, help = "Show probe loader and verifier output")]
    pub verbose: bool,

    #[clap(short, long, help = "Configuration file path (YAML, JSON or TOML)")]
    pub config: Option<PathBuf>,

    #[clap(short, long, help = "Write the capture report as JSON to this file")]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Layers the arguments over the builder; arguments win over files and
    /// environment.
    pub fn apply(&self, mut builder: ConfigurationBuilder) -> ConfigurationBuilder {
        if let Some(engine) = &self.engine {
            builder = builder.engine_name(engine);
        }
        if let Some(probe) = &self.probe {
            builder = builder.probe_object(probe.clone());
        }
        if let Some(duration) = self.duration {
            builder = builder.duration_secs(duration);
        }
        if let Some(max_events) = self.max_events {
            builder = builder.max_events(max_events);
        }
        if let Some(snaplen) = self.snaplen {
            builder = builder.setting(SettingEntry::new(Setting::Snaplen, snaplen, 0));
        }
        if let Some(pages) = self.buffer_pages {
            builder = builder.buffer_pages(pages);
        }
        if let Some(root) = &self.host_root {
            builder = builder.host_root(root.clone());
        }
        if self.verbose {
            builder = builder.verbose(true);
        }
        builder
    }

    /// Defaults, then the config file, then environment, then arguments.
    pub fn to_configuration(&self) -> Result<Configuration, EngineError> {
        let mut builder = Configuration::builder();
        if let Some(path) = &self.config {
            builder = builder.from_config_file(path)?;
        }
        let builder = builder.from_environment()?;
        self.apply(builder).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_short_and_long_flags() {
        let args = Args::parse_from([
            "capture-engine",
            "-e",
            "noop",
            "--snaplen",
            "256",
            "-n",
            "10",
            "-v",
        ]);

        assert_eq!(args.engine.as_deref(), Some("noop"));
        assert_eq!(args.snaplen, Some(256));
        assert_eq!(args.max_events, Some(10));
        assert!(args.verbose);
    }

    #[test]
    fn should_turn_snaplen_flag_into_setting() {
        let args = Args::parse_from(["capture-engine", "-e", "noop", "-s", "1024"]);

        let config = args.apply(Configuration::builder()).build().unwrap();

        assert_eq!(
            config.capture.settings,
            vec![SettingEntry::new(Setting::Snaplen, 1024, 0)]
        );
    }

    #[test]
    fn should_reject_invalid_buffer_pages() {
        let args = Args::parse_from(["capture-engine", "--buffer-pages", "3"]);

        assert!(args.apply(Configuration::builder()).build().is_err());
    }
}
