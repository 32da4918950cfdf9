//! Fixed-capacity FIFO of buffered fixes

use crate::core::fix::Fix;
use std::collections::VecDeque;

/// Number of fixes batched per cycle
pub const RING_CAPACITY: usize = 10;

/// One buffered fix and the outbound record composed from it
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateEntry {
    pub fix: Fix,

    /// Serialized outbound record; empty until the compose step runs
    pub message: String,

    /// Cleared once the entry has been consumed by a completed send
    pub ready_to_send: bool,
}

impl CoordinateEntry {
    pub fn new(fix: Fix) -> Self {
        Self {
            fix,
            message: String::new(),
            ready_to_send: true,
        }
    }
}

/// FIFO bounded to a fixed capacity; pushing when full evicts the oldest entry
#[derive(Debug, Clone)]
pub struct CoordinateRingBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> CoordinateRingBuffer<T> {
    pub fn new() -> Self {
        Self::with_capacity(RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, returning the evicted oldest one if the buffer was full
    pub fn push(&mut self, entry: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(entry);
        }
        let evicted = if self.is_full() {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Remove the oldest entry
    pub fn rotate_out(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    pub fn front(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.entries.front_mut()
    }

    pub fn back(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for CoordinateRingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateRingBuffer<CoordinateEntry> {
    /// Mark the oldest entry consumed and drop it from the buffer
    pub fn consume_oldest(&mut self) -> Option<CoordinateEntry> {
        if let Some(front) = self.entries.front_mut() {
            front.ready_to_send = false;
        }
        self.entries.pop_front()
    }
}
