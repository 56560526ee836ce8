// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed-window rate limiting keyed by source address.
//!
//! Each source gets a counter and the instant its window opened. When more than
//! `window` has elapsed since that instant the counter starts over. Bursts that
//! straddle a window boundary can therefore see up to twice the limit; that is
//! accepted.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use fnv::FnvBuildHasher;
use hashbrown::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_per_window: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
            max_per_window: 100,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateState {
    count: u32,
    window_start: Instant,
}

/// Per-source admission counter.
///
/// Entries are never evicted; one is kept for every address ever seen.
pub struct RateLimiter {
    config: RateLimitConfig,
    states: HashMap<IpAddr, RateState, FnvBuildHasher>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            states: HashMap::with_hasher(FnvBuildHasher::default()),
        }
    }

    /// Counts one message from `source` at `now` and reports whether it fits in
    /// the current window.
    pub fn admit(&mut self, source: IpAddr, now: Instant) -> bool {
        let state = self.states.entry(source).or_insert(RateState {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(state.window_start) > self.config.window {
            state.count = 0;
            state.window_start = now;
        }

        state.count = state.count.saturating_add(1);
        state.count <= self.config.max_per_window
    }

    pub fn tracked_sources(&self) -> usize {
        self.states.len()
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }
}
