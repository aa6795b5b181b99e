//! Per-CPU buffer set
//!
//! The probe publishes into one buffer per CPU. This module owns those
//! buffers, drains them in batches into reusable `BytesMut` pools and hands
//! events out one at a time, rotating across CPUs so a busy CPU cannot starve
//! the others.

use crate::errors::{EngineError, Result};
use crate::retrieval::EventRef;
use aya::maps::perf::PerfEventArrayBuffer;
use aya::maps::MapData;
use aya::util::online_cpus;
use bytes::BytesMut;
use log::warn;

/// Events pulled from a buffer in a single read.
pub const DEFAULT_POOL_SIZE: usize = 10;
/// Initial capacity of each pooled event buffer.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingRead {
    pub read: usize,
    pub lost: usize,
}

/// A single CPU's buffer as seen by the reader.
pub trait CpuRing {
    fn readable(&self) -> bool;

    /// Copies pending events into `out`, returning how many were written.
    fn read_events(&mut self, out: &mut [BytesMut]) -> anyhow::Result<RingRead>;
}

impl CpuRing for PerfEventArrayBuffer<MapData> {
    fn readable(&self) -> bool {
        PerfEventArrayBuffer::readable(self)
    }

    fn read_events(&mut self, out: &mut [BytesMut]) -> anyhow::Result<RingRead> {
        let events = PerfEventArrayBuffer::read_events(self, out)?;
        Ok(RingRead {
            read: events.read,
            lost: events.lost,
        })
    }
}

struct CpuSlot<R> {
    cpu: u16,
    ring: R,
    pool: Vec<BytesMut>,
    filled: usize,
    cursor: usize,
}

impl<R: CpuRing> CpuSlot<R> {
    fn has_pending(&self) -> bool {
        self.cursor < self.filled
    }
}

pub struct PerCpuBuffers<R = PerfEventArrayBuffer<MapData>> {
    slots: Vec<CpuSlot<R>>,
    next_slot: usize,
    lost: u64,
    pool_size: usize,
    event_capacity: usize,
}

impl<R: CpuRing> PerCpuBuffers<R> {
    pub fn new() -> Self {
        Self::with_pool(DEFAULT_POOL_SIZE, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_pool(pool_size: usize, event_capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            next_slot: 0,
            lost: 0,
            pool_size: pool_size.max(1),
            event_capacity,
        }
    }

    /// Registers the buffer of `cpu`.
    pub fn push(&mut self, cpu: u32, ring: R) -> Result<()> {
        let cpu = u16::try_from(cpu).map_err(|_| EngineError::RetrievalFailed {
            source: anyhow::anyhow!("cpu id {} does not fit the event cpu field", cpu),
        })?;
        self.slots.push(CpuSlot {
            cpu,
            ring,
            pool: create_buffer_pool(self.event_capacity, self.pool_size),
            filled: 0,
            cursor: 0,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn cpus(&self) -> Vec<u16> {
        self.slots.iter().map(|slot| slot.cpu).collect()
    }

    /// Samples the kernel reported as lost while we were reading.
    pub fn lost(&self) -> u64 {
        self.lost
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.next_slot = 0;
        self.lost = 0;
    }

    /// Returns the next available event, or `None` if every buffer is empty.
    pub fn consume_one(&mut self) -> Result<Option<EventRef<'_>>> {
        let count = self.slots.len();
        for offset in 0..count {
            let index = (self.next_slot + offset) % count;
            let slot = &mut self.slots[index];

            if !slot.has_pending() {
                if !slot.ring.readable() {
                    continue;
                }
                let batch = slot
                    .ring
                    .read_events(&mut slot.pool)
                    .map_err(|source| EngineError::RetrievalFailed { source })?;
                self.lost = self.lost.wrapping_add(batch.lost as u64);
                if batch.lost > 0 {
                    warn!("cpu {} lost {} events", slot.cpu, batch.lost);
                }
                slot.filled = batch.read.min(slot.pool.len());
                slot.cursor = 0;
                if slot.filled == 0 {
                    continue;
                }
            }

            let position = slot.cursor;
            slot.cursor += 1;
            self.next_slot = (index + 1) % count;

            let slot = &self.slots[index];
            return Ok(Some(EventRef {
                data: &slot.pool[position][..],
                cpu: slot.cpu,
            }));
        }
        Ok(None)
    }
}

impl<R: CpuRing> Default for PerCpuBuffers<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn create_buffer_pool(buffer_size: usize, pool_size: usize) -> Vec<BytesMut> {
    (0..pool_size)
        .map(|_| BytesMut::with_capacity(buffer_size))
        .collect()
}

/// Online CPUs, falling back to CPU 0 when they cannot be detected.
pub fn detect_online_cpus() -> Vec<u32> {
    match online_cpus() {
        Ok(cpus) => {
            if cpus.is_empty() {
                warn!("No online CPUs detected, defaulting to CPU 0");
                vec![0]
            } else {
                cpus
            }
        }
        Err(e) => {
            warn!("Failed to detect online CPUs: {:?}, defaulting to CPU 0", e);
            vec![0]
        }
    }
}
