use std::collections::VecDeque;
use std::num::NonZeroUsize;

use dvdash_core::Packet;

/// Bounded FIFO of emitted packets, replayed to clients on connect.
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: VecDeque<Packet>,
    capacity: NonZeroUsize,
}

impl HistoryBuffer {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.get()),
            capacity,
        }
    }

    /// Add at the tail, evicting from the head once over capacity.
    pub fn append(&mut self, packet: Packet) {
        self.entries.push_back(packet);
        while self.entries.len() > self.capacity.get() {
            self.entries.pop_front();
        }
    }

    /// Ordered copy, oldest first.
    pub fn snapshot(&self) -> Vec<Packet> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }
}
