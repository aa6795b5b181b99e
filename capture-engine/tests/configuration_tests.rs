//! Tests for the unified configuration system

use capture_engine::configuration::{Configuration, DEFAULT_POLL_INTERVAL_MS};
use capture_engine::engine::OpenArgs;
use capture_engine::{Setting, SettingEntry};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{Builder, NamedTempFile};

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

mod defaults {
    use super::*;

    #[test]
    fn should_default_to_modern_bpf_on_host_root() {
        let config = Configuration::builder().build().unwrap();

        assert_eq!(config.engine.name, "modern_bpf");
        assert_eq!(config.probe.host_root, PathBuf::from("/"));
        assert_eq!(config.capture.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(config.capture.settings.is_empty());
        assert!(config.capture_duration().is_none());
    }

    #[test]
    fn should_produce_open_args_from_engine_and_probe_sections() {
        let config = Configuration::builder()
            .engine_name("noop")
            .probe_object("/opt/probe.o")
            .verbose(true)
            .build()
            .unwrap();

        let args: OpenArgs = config.open_args();

        assert_eq!(args.engine_name, "noop");
        assert_eq!(args.probe.object_path, Some(PathBuf::from("/opt/probe.o")));
        assert!(args.probe.verbose);
    }
}

mod cli_arguments {
    use super::*;

    #[test]
    fn should_parse_capture_limits_and_snaplen() {
        let config = Configuration::builder()
            .from_cli_args(&["--duration", "30", "--max-events", "500", "--snaplen", "256"])
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.capture_duration(), Some(Duration::from_secs(30)));
        assert_eq!(config.capture.max_events, Some(500));
        assert_eq!(
            config.capture.settings,
            vec![SettingEntry::new(Setting::Snaplen, 256, 0)]
        );
    }

    #[test]
    fn should_reject_non_numeric_duration() {
        let result = Configuration::builder().from_cli_args(&["--duration", "soon"]);

        assert!(result.is_err());
    }
}

mod config_files {
    use super::*;

    #[test]
    fn should_load_yaml_file() {
        let file = config_file(
            ".yaml",
            r#"
engine:
  name: noop
probe:
  buffer_pages: 64
capture:
  max_events: 10
  settings:
    - setting: snaplen
      arg1: 512
    - setting: sampling_ratio
      arg1: 2
      arg2: 1
"#,
        );

        let config = Configuration::builder()
            .from_config_file(file.path())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.engine.name, "noop");
        assert_eq!(config.probe.buffer_pages, Some(64));
        assert_eq!(config.capture.max_events, Some(10));
        assert_eq!(
            config.capture.settings,
            vec![
                SettingEntry::new(Setting::Snaplen, 512, 0),
                SettingEntry::new(Setting::SamplingRatio, 2, 1),
            ]
        );
        assert_eq!(config.runtime.config_file, Some(file.path().to_path_buf()));
    }

    #[test]
    fn should_load_json_file() {
        let file = config_file(
            ".json",
            r#"{"probe": {"object_path": "/opt/probe.o", "verbose": true}}"#,
        );

        let config = Configuration::builder()
            .from_config_file(file.path())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.probe.object_path, Some(PathBuf::from("/opt/probe.o")));
        assert!(config.is_verbose());
        assert_eq!(config.engine.name, "modern_bpf");
    }

    #[test]
    fn should_load_toml_file() {
        let file = config_file(
            ".toml",
            r#"
[capture]
poll_interval_ms = 25
duration_secs = 5

[[capture.settings]]
setting = "event_mask"
arg1 = 7
"#,
        );

        let config = Configuration::builder()
            .from_config_file(file.path())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.poll_interval(), Duration::from_millis(25));
        assert_eq!(config.capture_duration(), Some(Duration::from_secs(5)));
        assert_eq!(
            config.capture.settings,
            vec![SettingEntry::new(Setting::EventMask, 7, 0)]
        );
    }

    #[test]
    fn should_let_cli_arguments_override_file_values() {
        let file = config_file(".yaml", "engine:\n  name: noop\n");

        let config = Configuration::builder()
            .from_config_file(file.path())
            .unwrap()
            .from_cli_args(&["--engine", "modern_bpf"])
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.engine.name, "modern_bpf");
    }

    #[test]
    fn should_reject_unknown_setting_names() {
        let result = Configuration::builder()
            .from_yaml_str("capture:\n  settings:\n    - setting: turbo_mode\n");

        assert!(result.is_err());
    }

    #[test]
    fn should_fail_on_missing_file() {
        let result = Configuration::builder().from_config_file("/nonexistent/capture.yaml");

        assert!(result.is_err());
    }
}

mod validation {
    use super::*;

    #[test]
    fn should_reject_non_power_of_two_buffer_pages() {
        let result = Configuration::builder().buffer_pages(48).build();

        assert!(result.is_err());
    }

    #[test]
    fn should_reject_zero_poll_interval() {
        let result = Configuration::builder().poll_interval_ms(0).build();

        assert!(result.is_err());
    }

    #[test]
    fn should_reject_empty_engine_name() {
        let result = Configuration::builder().engine_name("  ").build();

        assert!(result.is_err());
    }

    #[test]
    fn should_reject_snaplen_beyond_probe_range() {
        let result = Configuration::builder()
            .setting(SettingEntry::new(Setting::Snaplen, u64::from(u32::MAX) + 1, 0))
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn should_accept_unsupported_settings_with_any_arguments() {
        let result = Configuration::builder()
            .setting(SettingEntry::new(Setting::StatsdPort, u64::MAX, u64::MAX))
            .build();

        assert!(result.is_ok());
    }
}
