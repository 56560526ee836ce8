// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parsing of syslog lines in the layout
//! `<PRI>VERSION TIMESTAMP HOSTNAME APP-NAME PROCID MSGID STRUCTURED-DATA MSG`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::ParseError;
use crate::severity::Level;

const MAX_PRIORITY: u8 = 191;

static SYSLOG_REGEX: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)]
fn syslog_regex() -> &'static Regex {
    SYSLOG_REGEX.get_or_init(|| {
        Regex::new(
            r"(?s)^<(\d+)>(\d{1,2})\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(-|(?:\[[^\]]*\])+)(?:\s(.*))?$",
        )
        .expect("syslog regex must compile")
    })
}

/// A record decoded from one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogMessage {
    pub priority: u8,
    pub version: u8,
    pub timestamp: String,
    pub hostname: String,
    pub app_name: String,
    pub proc_id: String,
    pub msg_id: String,
    pub structured_data: String,
    pub message: String,
}

impl SyslogMessage {
    pub fn level(&self) -> Level {
        Level::from_priority(self.priority)
    }
}

/// Renders every field after `<PRI>VERSION`, which is what gets logged.
impl fmt::Display for SyslogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.timestamp,
            self.hostname,
            self.app_name,
            self.proc_id,
            self.msg_id,
            self.structured_data,
            self.message
        )
    }
}

/// Parses a decoded line. A trailing line terminator is ignored.
pub fn parse(line: &str) -> Result<SyslogMessage, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let caps = syslog_regex().captures(line).ok_or(ParseError::Malformed)?;

    let field = |i: usize| caps.get(i).map_or("", |m| m.as_str());

    let priority = field(1)
        .parse::<u8>()
        .ok()
        .filter(|p| *p <= MAX_PRIORITY)
        .ok_or_else(|| ParseError::PriorityOutOfRange(field(1).to_string()))?;
    let version = field(2).parse::<u8>().map_err(|_| ParseError::Malformed)?;

    Ok(SyslogMessage {
        priority,
        version,
        timestamp: field(3).to_string(),
        hostname: field(4).to_string(),
        app_name: field(5).to_string(),
        proc_id: field(6).to_string(),
        msg_id: field(7).to_string(),
        structured_data: field(8).to_string(),
        message: field(9).to_string(),
    })
}

/// Decodes raw datagram bytes and parses them.
pub fn parse_bytes(buf: &[u8]) -> Result<SyslogMessage, ParseError> {
    let line = std::str::from_utf8(buf).map_err(|_| ParseError::InvalidEncoding)?;
    parse(line)
}
