// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer side of the wire format, used by upstream services to ship their
//! own log lines to the listener.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use chrono::{SecondsFormat, Utc};
use tokio::net::UdpSocket;
use tracing::trace;

use crate::errors::SendError;
use crate::severity::Level;

/// Facility 1, user-level messages.
pub const USER_FACILITY: u8 = 1;

const NIL_VALUE: &str = "-";

/// PRI value for `level` under [`USER_FACILITY`].
pub fn priority(level: Level) -> u8 {
    USER_FACILITY * 8 + level.severity_code()
}

pub struct SyslogSender {
    socket: UdpSocket,
    target: SocketAddr,
    hostname: String,
    app_name: String,
    proc_id: u32,
}

impl SyslogSender {
    /// Binds an ephemeral local socket of the same family as `target`.
    pub async fn new(
        target: SocketAddr,
        hostname: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Result<Self, SendError> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0).into(),
            SocketAddr::V6(_) => (IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0).into(),
        };
        let socket = UdpSocket::bind(local).await.map_err(SendError::Bind)?;

        Ok(Self {
            socket,
            target,
            hostname: hostname.into(),
            app_name: app_name.into(),
            proc_id: std::process::id(),
        })
    }

    /// Renders one datagram. Empty `msg_id` or `structured_data` become `-`.
    pub fn format_message(
        &self,
        level: Level,
        msg_id: &str,
        structured_data: &str,
        message: &str,
        timestamp: &str,
    ) -> String {
        format!(
            "<{}>1 {} {} {} {} {} {} {}",
            priority(level),
            timestamp,
            nil_if_empty(&self.hostname),
            nil_if_empty(&self.app_name),
            self.proc_id,
            nil_if_empty(msg_id),
            nil_if_empty(structured_data),
            message
        )
    }

    /// Sends `message` stamped with the current UTC time.
    pub async fn send(
        &self,
        level: Level,
        msg_id: &str,
        structured_data: &str,
        message: &str,
    ) -> Result<(), SendError> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let datagram = self.format_message(level, msg_id, structured_data, message, &timestamp);
        trace!("Sending syslog datagram to {}: {}", self.target, datagram);

        self.socket
            .send_to(datagram.as_bytes(), self.target)
            .await
            .map_err(|source| SendError::Send {
                target: self.target,
                source,
            })?;
        Ok(())
    }
}

fn nil_if_empty(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        NIL_VALUE
    } else {
        value
    }
}
