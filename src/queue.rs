//! Pending interrupt queue.
//!
//! Requests are kept ordered by their arbitration key (rank, arrival tick,
//! generation order), so the head is always the next request to service.
//! The generation sequence number makes every key unique, which gives stable
//! FIFO behaviour for requests of equal rank and tick.

use std::collections::BTreeMap;

use crate::device::Device;
use crate::request::InterruptRequest;
use crate::types::{SeqNo, Tick};

#[derive(Debug, Default, Clone)]
pub struct PendingQueue {
    entries: BTreeMap<(u8, Tick, SeqNo), InterruptRequest>,
}

impl PendingQueue {
    pub fn new() -> Self {
        PendingQueue {
            entries: BTreeMap::new(),
        }
    }

    /// Insert a request, keeping service order.
    pub fn enqueue(&mut self, request: InterruptRequest) {
        self.entries.insert(request.key(), request);
    }

    /// Remove and return the next request to service.
    pub fn dequeue_next(&mut self) -> Option<InterruptRequest> {
        self.entries.pop_first().map(|(_, r)| r)
    }

    /// Next request to service, without removing it.
    pub fn peek(&self) -> Option<&InterruptRequest> {
        self.entries.values().next()
    }

    /// All queued requests that arrived at `tick`, in service order.
    pub fn peek_simultaneous(&self, tick: Tick) -> Vec<InterruptRequest> {
        self.entries
            .values()
            .filter(|r| r.arrival == tick)
            .copied()
            .collect()
    }

    /// Whether `device` already has a request queued for `tick`.
    pub fn contains(&self, device: Device, tick: Tick) -> bool {
        self.entries
            .values()
            .any(|r| r.device == device && r.arrival == tick)
    }

    /// Snapshot of the queue in service order.
    pub fn ordered(&self) -> Vec<InterruptRequest> {
        self.entries.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
