// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The ingestion service object shared by the listener and the drainer, and
//! the entry point that starts both.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::IngestConfig;
use crate::deferred_queue::{DeferredEntry, DeferredQueue};
use crate::drainer::Drainer;
use crate::errors::ListenerError;
use crate::listener::Listener;
use crate::message;
use crate::rate_limiter::RateLimiter;
use crate::severity::Level;
use crate::sink::Sink;

/// State shared between the listener and the drainer: the sink, the deferred
/// queue and the shutdown token.
pub struct IngestService {
    sink: Sink,
    deferred: DeferredQueue,
    cancel_token: CancellationToken,
}

impl IngestService {
    pub fn new(sink: Sink, queue_capacity: usize, cancel_token: CancellationToken) -> Self {
        Self {
            sink,
            deferred: DeferredQueue::new(queue_capacity),
            cancel_token,
        }
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Decodes and parses a datagram and writes it to the sink at its mapped
    /// level. Anything undecodable or malformed is reported as a warning and
    /// dropped.
    pub fn process(&self, raw: &[u8], source: SocketAddr) {
        match message::parse_bytes(raw) {
            Ok(msg) => {
                self.sink
                    .log(msg.level(), &msg.to_string(), &record_origin(source));
            }
            Err(_) => {
                self.sink.log(
                    Level::Warning,
                    &format!("Invalid syslog message: {}", String::from_utf8_lossy(raw)),
                    &syslog_origin(source),
                );
            }
        }
    }

    /// Queues a message that went over its source's rate limit.
    pub fn defer(&self, raw: Vec<u8>, source: SocketAddr, now: Instant) {
        self.sink.log(
            Level::Warning,
            &format!(
                "Rate limit exceeded for {}. Delaying message: {}",
                source.ip(),
                String::from_utf8_lossy(&raw)
            ),
            &syslog_origin(source),
        );

        let entry = DeferredEntry {
            raw,
            source,
            enqueued_at: now,
        };
        if let Some(evicted) = self.deferred.push(entry) {
            debug!(
                "Deferred queue full, evicted oldest entry from {}",
                evicted.source
            );
        }
    }

    /// Processes the oldest deferred entry, if any. Returns whether one was
    /// processed.
    pub fn drain_one(&self) -> bool {
        match self.deferred.pop_front() {
            Some(entry) => {
                trace!(
                    "Draining deferred message from {} queued {:?} ago",
                    entry.source,
                    entry.enqueued_at.elapsed()
                );
                self.process(&entry.raw, entry.source);
                true
            }
            None => false,
        }
    }
}

fn record_origin(source: SocketAddr) -> String {
    format!("sourceIP-{}", source.ip())
}

fn syslog_origin(source: SocketAddr) -> String {
    format!("Syslog-{}", source.ip())
}

/// A running listener and drainer.
pub struct IngestHandle {
    service: Arc<IngestService>,
    local_addr: SocketAddr,
    listener_task: JoinHandle<()>,
    drainer_task: JoinHandle<()>,
}

impl IngestHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn service(&self) -> &Arc<IngestService> {
        &self.service
    }

    /// Signals shutdown and waits for both loops to exit.
    pub async fn shutdown(self) {
        self.service.shutdown();
        if let Err(e) = self.listener_task.await {
            debug!("Listener task ended abnormally: {}", e);
        }
        if let Err(e) = self.drainer_task.await {
            debug!("Drainer task ended abnormally: {}", e);
        }
    }
}

/// Binds the listener and spawns the listener and drainer tasks.
///
/// Only a bind failure is returned; everything after that is handled per
/// message.
pub async fn start(config: &IngestConfig, sink: Sink) -> Result<IngestHandle, ListenerError> {
    let service = Arc::new(IngestService::new(
        sink,
        config.queue_capacity,
        CancellationToken::new(),
    ));

    let listener = Listener::bind(
        &config.listener_config(),
        RateLimiter::new(config.rate_limit),
        Arc::clone(&service),
    )
    .await?;
    let local_addr = listener.local_addr();
    info!("syslog-udp: starting to listen on {}", local_addr);

    let drainer = Drainer::new(Arc::clone(&service), config.drain_interval);

    let listener_task = tokio::spawn(listener.spin());
    let drainer_task = tokio::spawn(drainer.spin());

    Ok(IngestHandle {
        service,
        local_addr,
        listener_task,
        drainer_task,
    })
}
