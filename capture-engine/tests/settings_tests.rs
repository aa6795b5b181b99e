//! Tests for runtime settings applied to the modern_bpf engine

mod common;

use assert_matches::assert_matches;
use capture_engine::engine::Engine;
use capture_engine::errors::EngineError;
use capture_engine::Setting;
use common::{initialized_engine, Call, CallLog, RecordingProbeManager};

fn backend_calls_after_init(calls: &CallLog) -> Vec<Call> {
    calls
        .borrow()
        .iter()
        .filter(|call| !matches!(call, Call::Step(_)))
        .copied()
        .collect()
}

mod supported_settings {
    use super::*;

    #[test]
    fn should_forward_exactly_the_first_argument_as_snaplen() {
        let (manager, calls) = RecordingProbeManager::new();
        let mut engine = initialized_engine(manager);

        let result = engine.configure(Setting::Snaplen.raw(), 4096, 77);

        assert!(result.is_ok());
        assert_eq!(backend_calls_after_init(&calls), vec![Call::SetSnaplen(4096)]);
    }

    #[test]
    fn should_not_fall_through_into_the_next_setting() {
        let (manager, calls) = RecordingProbeManager::new();
        let mut engine = initialized_engine(manager);

        engine.configure(Setting::Snaplen.raw(), 128, 0).unwrap();
        engine.configure(Setting::EventMask.raw(), 128, 0).unwrap();

        assert_eq!(backend_calls_after_init(&calls), vec![Call::SetSnaplen(128)]);
    }
}

mod unsupported_settings {
    use super::*;

    #[test]
    fn should_accept_every_other_setting_without_touching_the_probe() {
        for setting in Setting::ALL {
            if setting == Setting::Snaplen {
                continue;
            }
            let (manager, calls) = RecordingProbeManager::new();
            let mut engine = initialized_engine(manager);

            for (arg1, arg2) in [(0, 0), (1, u64::MAX), (u64::MAX, 7)] {
                assert!(engine.configure(setting.raw(), arg1, arg2).is_ok(), "{}", setting);
            }

            assert!(backend_calls_after_init(&calls).is_empty(), "{}", setting);
        }
    }
}

mod unknown_settings {
    use super::*;

    #[test]
    fn should_fail_and_describe_the_tag_and_both_arguments() {
        let (manager, calls) = RecordingProbeManager::new();
        let mut engine = initialized_engine(manager);

        let result = engine.configure(9, 11, 22);

        assert_matches!(
            result,
            Err(EngineError::UnknownSetting {
                setting: 9,
                arg1: 11,
                arg2: 22
            })
        );
        assert_eq!(engine.last_error(), "Unsupported setting 9 (args 11, 22)");
        assert!(backend_calls_after_init(&calls).is_empty());
    }

    #[test]
    fn should_keep_last_error_after_a_later_success() {
        let (manager, _calls) = RecordingProbeManager::new();
        let mut engine = initialized_engine(manager);

        let _ = engine.configure(1000, 1, 2);
        engine.configure(Setting::PageFaults.raw(), 1, 0).unwrap();

        assert_eq!(engine.last_error(), "Unsupported setting 1000 (args 1, 2)");
    }

    #[test]
    fn should_overwrite_last_error_on_each_failure() {
        let (manager, _calls) = RecordingProbeManager::new();
        let mut engine = initialized_engine(manager);

        let _ = engine.configure(1000, 1, 2);
        let _ = engine.configure(u32::MAX, 3, 4);

        assert_eq!(
            engine.last_error(),
            format!("Unsupported setting {} (args 3, 4)", u32::MAX)
        );
    }
}
