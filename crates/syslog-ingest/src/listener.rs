// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! UDP syslog listener.
//!
//! Receives datagrams, counts each against its source's rate limit, and either
//! hands the message to the sink right away or parks it in the deferred queue
//! for the [`crate::drainer::Drainer`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, error, trace};

use crate::errors::ListenerError;
use crate::rate_limiter::RateLimiter;
use crate::service::IngestService;

// Largest UDP payload, so no datagram is ever truncated
const BUFFER_SIZE: usize = 65_535;

pub const DEFAULT_PORT: u16 = 514;
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Host to bind UDP socket to (e.g., "0.0.0.0")
    pub host: String,
    /// Port to bind UDP socket to; 0 picks a free port
    pub port: u16,
    /// Upper bound on a single receive, and so on shutdown latency
    pub recv_timeout: Duration,
}

pub struct Listener {
    socket: UdpSocket,
    local_addr: SocketAddr,
    rate_limiter: RateLimiter,
    service: Arc<IngestService>,
    recv_timeout: Duration,
}

impl Listener {
    pub async fn bind(
        config: &ListenerConfig,
        rate_limiter: RateLimiter,
        service: Arc<IngestService>,
    ) -> Result<Self, ListenerError> {
        let addr = format!("{}:{}", config.host, config.port);
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        let local_addr = socket.local_addr().map_err(ListenerError::LocalAddr)?;

        Ok(Self {
            socket,
            local_addr,
            rate_limiter,
            service,
            recv_timeout: config.recv_timeout,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive loop. Returns once shutdown is requested or the socket fails.
    pub async fn spin(mut self) {
        let cancel_token = self.service.cancel_token().clone();
        let mut buf = vec![0u8; BUFFER_SIZE];

        while !cancel_token.is_cancelled() {
            let received = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    break;
                }
                received = timeout(self.recv_timeout, self.socket.recv_from(&mut buf)) => received,
            };

            match received {
                // nothing arrived; go around and look at the shutdown flag
                Err(_) => continue,
                Ok(Ok((amt, src))) => self.handle_datagram(&buf[..amt], src, Instant::now()),
                Ok(Err(e)) => {
                    error!("Error receiving syslog datagram on {}: {}", self.local_addr, e);
                    break;
                }
            }
        }

        debug!("Syslog listener on {} stopping", self.local_addr);
        self.service.sink().flush();
    }

    /// Routes one datagram received from `source` at `now`. Every datagram
    /// counts against the limit before it is decoded.
    pub fn handle_datagram(&mut self, buf: &[u8], source: SocketAddr, now: Instant) {
        trace!("Received {} bytes from {}", buf.len(), source);

        if self.rate_limiter.admit(source.ip(), now) {
            self.service.process(buf, source);
        } else {
            self.service.defer(buf.to_vec(), source, now);
        }
    }
}
