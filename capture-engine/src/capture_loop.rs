//! Polling capture loop
//!
//! `next` never waits for data, so the loop owns the poll cadence: it drains
//! events while they are available and sleeps for the poll interval whenever
//! the engine reports a timeout.

use crate::errors::Result;
use crate::retrieval::Retrieved;
use crate::session::CaptureSession;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Events handled between two cooperative yields to the runtime.
const YIELD_EVERY: u64 = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureSummary {
    pub events: u64,
    pub bytes: u64,
    pub timeouts: u64,
    pub events_per_cpu: BTreeMap<u16, u64>,
}

impl CaptureSummary {
    fn record(&mut self, cpu: u16, len: usize) {
        self.events += 1;
        self.bytes += len as u64;
        *self.events_per_cpu.entry(cpu).or_insert(0) += 1;
    }
}

pub struct CaptureLoop {
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    max_events: Option<u64>,
    duration: Option<Duration>,
}

impl CaptureLoop {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            poll_interval,
            max_events: None,
            duration: None,
        }
    }

    pub fn with_max_events(mut self, max_events: Option<u64>) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    /// Flag that stops the loop once cleared, e.g. from a signal handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub async fn run(&self, session: &mut CaptureSession) -> Result<CaptureSummary> {
        let deadline = self.duration.map(|d| Instant::now() + d);
        let mut summary = CaptureSummary::default();

        while self.running.load(Ordering::Relaxed) {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                info!("capture completed after {:?}", self.duration.unwrap_or_default());
                break;
            }

            let idle = match session.next()? {
                Retrieved::Event(event) => {
                    summary.record(event.cpu, event.data.len());
                    false
                }
                Retrieved::Timeout => {
                    summary.timeouts += 1;
                    true
                }
            };

            if self.max_events.is_some_and(|max| summary.events >= max) {
                info!("reached {} events, stopping", summary.events);
                break;
            }

            if idle {
                tokio::time::sleep(self.poll_interval).await;
            } else if summary.events % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }

        debug!(
            "capture loop done: {} events, {} timeouts",
            summary.events, summary.timeouts
        );
        Ok(summary)
    }
}
