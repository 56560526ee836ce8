// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log levels and the priority-to-level table used for received records.

use std::str::FromStr;

use derive_more::Display;

use crate::errors::ConfigError;

/// Level a line is written at by the [`crate::sink::Sink`].
///
/// Ordered from least to most severe so level filters can compare them.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    #[display("DEBUG")]
    Debug,
    #[display("INFO")]
    Info,
    #[display("NOTICE")]
    Notice,
    #[display("WARNING")]
    Warning,
    #[display("ERROR")]
    Error,
    #[display("CRITICAL")]
    Critical,
    #[display("ALERT")]
    Alert,
}

impl Level {
    /// Maps a PRI value to a level through `priority % 8`.
    ///
    /// Severity 0 and 2 both map to [`Level::Critical`]; producers never emit
    /// severity 0 and downstream consumers rely on the table as is.
    pub fn from_priority(priority: u8) -> Level {
        match priority % 8 {
            0 => Level::Critical,
            1 => Level::Alert,
            2 => Level::Critical,
            3 => Level::Error,
            4 => Level::Warning,
            5 => Level::Notice,
            6 => Level::Info,
            7 => Level::Debug,
            _ => Level::Info,
        }
    }

    /// Syslog severity code a producer puts in the PRI field.
    pub fn severity_code(self) -> u8 {
        match self {
            Level::Alert => 1,
            Level::Critical => 2,
            Level::Error => 3,
            Level::Warning => 4,
            Level::Notice => 5,
            Level::Info => 6,
            Level::Debug => 7,
        }
    }

    /// `tracing` level the event is emitted at. Coarser than `Level`, so it is
    /// only a filter hint; destinations compare on the exact level.
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            Level::Debug => tracing::Level::DEBUG,
            Level::Info | Level::Notice => tracing::Level::INFO,
            Level::Warning => tracing::Level::WARN,
            Level::Error | Level::Critical | Level::Alert => tracing::Level::ERROR,
        }
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "notice" => Ok(Level::Notice),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" => Ok(Level::Critical),
            "alert" => Ok(Level::Alert),
            other => Err(ConfigError::Invalid {
                key: "level",
                reason: format!("unknown level '{other}'"),
            }),
        }
    }
}
