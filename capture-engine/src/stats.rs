//! Capture statistics snapshots

use capture_engine_common::ProbeCounters;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub n_evts: u64,
    pub n_drops: u64,
    pub n_drops_buffer: u64,
    pub n_drops_max_event_size: u64,
    pub n_drops_pf: u64,
    pub n_drops_bug: u64,
    pub n_preemptions: u64,
    pub n_suppressed: u64,
    pub n_tids_suppressed: u64,
}

impl CaptureStats {
    /// Builds a snapshot from the probe counters summed over every CPU plus
    /// the samples user space lost while draining the buffers.
    pub fn from_counters(counters: &ProbeCounters, lost_in_userspace: u64) -> Self {
        let n_drops_buffer = counters.n_drops_buffer.wrapping_add(lost_in_userspace);
        Self {
            n_evts: counters.n_evts,
            n_drops: n_drops_buffer.wrapping_add(counters.n_drops_max_event_size),
            n_drops_buffer,
            n_drops_max_event_size: counters.n_drops_max_event_size,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_sum_buffer_and_size_drops() {
        let counters = ProbeCounters::new()
            .with_events(100)
            .with_buffer_drops(3)
            .with_max_event_size_drops(2);

        let stats = CaptureStats::from_counters(&counters, 0);

        assert_eq!(stats.n_evts, 100);
        assert_eq!(stats.n_drops_buffer, 3);
        assert_eq!(stats.n_drops, 5);
        assert_eq!(stats.n_drops_pf, 0);
    }

    #[test]
    fn should_count_userspace_losses_as_buffer_drops() {
        let counters = ProbeCounters::new().with_events(10).with_buffer_drops(1);

        let stats = CaptureStats::from_counters(&counters, 4);

        assert_eq!(stats.n_drops_buffer, 5);
        assert_eq!(stats.n_drops, 5);
    }
}
