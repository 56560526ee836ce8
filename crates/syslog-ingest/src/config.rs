// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::deferred_queue::DEFAULT_QUEUE_CAPACITY;
use crate::drainer::DEFAULT_DRAIN_INTERVAL;
use crate::errors::ConfigError;
use crate::listener::{ListenerConfig, DEFAULT_PORT, DEFAULT_RECV_TIMEOUT};
use crate::rate_limiter::RateLimitConfig;
use crate::severity::Level;
use crate::sink::SinkConfig;

const DEFAULT_HOST: &str = "0.0.0.0";

const HOST: &str = "SYSLOG_INGEST_HOST";
const PORT: &str = "SYSLOG_INGEST_PORT";
const RECV_TIMEOUT_MS: &str = "SYSLOG_INGEST_RECV_TIMEOUT_MS";
const RATE_LIMIT_WINDOW_SECS: &str = "SYSLOG_INGEST_RATE_LIMIT_WINDOW_SECS";
const RATE_LIMIT_MAX: &str = "SYSLOG_INGEST_RATE_LIMIT_MAX";
const QUEUE_CAPACITY: &str = "SYSLOG_INGEST_QUEUE_CAPACITY";
const DRAIN_INTERVAL_MS: &str = "SYSLOG_INGEST_DRAIN_INTERVAL_MS";
const LOG_FILE: &str = "SYSLOG_INGEST_LOG_FILE";
const CONSOLE_LEVEL: &str = "SYSLOG_INGEST_CONSOLE_LEVEL";
const FILE_LEVEL: &str = "SYSLOG_INGEST_FILE_LEVEL";
const SERVICE_NAME: &str = "SYSLOG_INGEST_SERVICE_NAME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub host: String,
    pub port: u16,
    pub recv_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub queue_capacity: usize,
    /// how often the drainer pops a deferred entry
    pub drain_interval: Duration,
    pub sink: SinkConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            rate_limit: RateLimitConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            sink: SinkConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from `lookup`, which maps variable names to values.
    ///
    /// Numbers that don't parse fall back to their defaults. Zero limits and
    /// unknown level names are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| -> Option<u64> { lookup(key).and_then(|v| v.trim().parse().ok()) };

        let host = lookup(HOST).unwrap_or(defaults.host);
        let port = lookup(PORT)
            .and_then(|port| port.trim().parse::<u16>().ok())
            .unwrap_or(defaults.port);
        let recv_timeout = parsed(RECV_TIMEOUT_MS)
            .map(Duration::from_millis)
            .unwrap_or(defaults.recv_timeout);
        let window = parsed(RATE_LIMIT_WINDOW_SECS)
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit.window);
        let max_per_window = parsed(RATE_LIMIT_MAX)
            .and_then(|max| u32::try_from(max).ok())
            .unwrap_or(defaults.rate_limit.max_per_window);
        let queue_capacity = parsed(QUEUE_CAPACITY)
            .and_then(|cap| usize::try_from(cap).ok())
            .unwrap_or(defaults.queue_capacity);
        let drain_interval = parsed(DRAIN_INTERVAL_MS)
            .map(Duration::from_millis)
            .unwrap_or(defaults.drain_interval);

        let sink = SinkConfig {
            service_name: lookup(SERVICE_NAME).unwrap_or(defaults.sink.service_name),
            log_file: lookup(LOG_FILE)
                .map(PathBuf::from)
                .unwrap_or(defaults.sink.log_file),
            console_level: parse_level(CONSOLE_LEVEL, lookup(CONSOLE_LEVEL))?
                .unwrap_or(defaults.sink.console_level),
            file_level: parse_level(FILE_LEVEL, lookup(FILE_LEVEL))?
                .unwrap_or(defaults.sink.file_level),
        };

        let config = Self {
            host,
            port,
            recv_timeout,
            rate_limit: RateLimitConfig {
                window,
                max_per_window,
            },
            queue_capacity,
            drain_interval,
            sink,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 5] = [
            (RECV_TIMEOUT_MS, self.recv_timeout.is_zero()),
            (RATE_LIMIT_WINDOW_SECS, self.rate_limit.window.is_zero()),
            (RATE_LIMIT_MAX, self.rate_limit.max_per_window == 0),
            (QUEUE_CAPACITY, self.queue_capacity == 0),
            (DRAIN_INTERVAL_MS, self.drain_interval.is_zero()),
        ];
        match checks.into_iter().find(|(_, is_zero)| *is_zero) {
            Some((key, _)) => Err(ConfigError::Invalid {
                key,
                reason: "must be greater than zero".to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            host: self.host.clone(),
            port: self.port,
            recv_timeout: self.recv_timeout,
        }
    }
}

fn parse_level(key: &'static str, value: Option<String>) -> Result<Option<Level>, ConfigError> {
    value
        .map(|v| {
            Level::from_str(&v).map_err(|_| ConfigError::Invalid {
                key,
                reason: format!("unknown level '{v}'"),
            })
        })
        .transpose()
}
