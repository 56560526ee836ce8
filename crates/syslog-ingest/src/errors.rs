// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the ingestion pipeline.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Reasons a received line cannot be turned into a [`crate::message::SyslogMessage`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line does not match the syslog layout")]
    Malformed,
    #[error("priority {0} is outside 0..=191")]
    PriorityOutOfRange(String),
    #[error("datagram is not valid UTF-8")]
    InvalidEncoding,
}

/// Failures of the UDP listener. Only raised at startup.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("couldn't bind to address {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("couldn't open log file {path}: {source}")]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Failures of the producer-side sender.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("couldn't bind sender socket: {0}")]
    Bind(#[source] std::io::Error),
    #[error("couldn't send datagram to {target}: {source}")]
    Send {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
