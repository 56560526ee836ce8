// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::service::IngestService;

pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Background loop that processes one deferred entry per tick.
///
/// Deferred entries are not checked against the rate limiter again, so every
/// entry that survives in the queue is eventually written.
pub struct Drainer {
    service: Arc<IngestService>,
    interval: Duration,
}

impl Drainer {
    pub fn new(service: Arc<IngestService>, interval: Duration) -> Self {
        Self {
            service,
            // tokio intervals panic on a zero period
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub async fn spin(self) {
        let cancel_token = self.service.cancel_token().clone();
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        debug!(
            "Drainer stopping with {} deferred entries left",
            self.service.deferred().len()
        );
    }

    /// Drains at most one entry. Returns whether one was processed.
    pub fn tick(&self) -> bool {
        self.service.drain_one()
    }
}
