//! Event retrieval multiplexer
//!
//! Presents the probe's per-CPU buffers as a single "next event" primitive.
//! Each call yields at most one event and never waits for data.
//!
//! Events from different CPUs are not merged by timestamp: two consecutive
//! events may be out of kernel order when they come from different CPUs.
//! Callers that need a total order must re-sort on the timestamps embedded in
//! the events themselves.

use crate::errors::Result;
use crate::probe_manager::ProbeManager;

/// Borrowed view of one event, valid until the next retrieval call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRef<'a> {
    pub data: &'a [u8],
    pub cpu: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retrieved<'a> {
    Event(EventRef<'a>),
    /// No buffer has data right now. Not an error.
    Timeout,
}

impl<'a> Retrieved<'a> {
    pub fn event(self) -> Option<EventRef<'a>> {
        match self {
            Retrieved::Event(event) => Some(event),
            Retrieved::Timeout => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Retrieved::Timeout)
    }
}

pub fn next_event<P: ProbeManager + ?Sized>(probe: &mut P) -> Result<Retrieved<'_>> {
    Ok(match probe.consume_one_from_buffers()? {
        Some(event) => Retrieved::Event(event),
        None => Retrieved::Timeout,
    })
}
