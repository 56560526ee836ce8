// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Instant;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// A datagram that went over its source's rate limit. The bytes are kept
/// undecoded and go through the same decode and parse as an admitted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredEntry {
    pub raw: Vec<u8>,
    pub source: SocketAddr,
    pub enqueued_at: Instant,
}

/// Bounded FIFO shared by the listener (producer) and the drainer (consumer).
///
/// When full, a push drops the oldest entry to make room.
pub struct DeferredQueue {
    capacity: usize,
    entries: Mutex<VecDeque<DeferredEntry>>,
}

impl DeferredQueue {
    /// `capacity` must be non-zero; a zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends `entry`, returning the entry evicted to make room, if any.
    pub fn push(&self, entry: DeferredEntry) -> Option<DeferredEntry> {
        #[allow(clippy::expect_used)]
        let mut entries = self.entries.lock().expect("lock poisoned");
        let evicted = if entries.len() >= self.capacity {
            entries.pop_front()
        } else {
            None
        };
        entries.push_back(entry);
        evicted
    }

    pub fn pop_front(&self) -> Option<DeferredEntry> {
        #[allow(clippy::expect_used)]
        let mut entries = self.entries.lock().expect("lock poisoned");
        entries.pop_front()
    }

    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        let entries = self.entries.lock().expect("lock poisoned");
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
