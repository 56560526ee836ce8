// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Dual-destination log writer for ingested records.
//!
//! Every line is rendered by one [`LineFormatter`]:
//! ```text
//! 2025-05-05 12:00:00,123 - log-server - WARNING - [Syslog-10.0.0.7] Invalid syslog message: oops
//! ```
//! and written to an interactive stream and to an append-only file, each with
//! its own minimum level.
//!
//! The sink is a self-contained `tracing` dispatcher. [`Sink::log`] emits into
//! it directly; installing it with [`Sink::install_global`] makes the
//! service's own `tracing` diagnostics share the same format and files, with
//! the event target standing in for the origin.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::field::{Field, Visit};
use tracing::Dispatch;
use tracing_core::{Event, Metadata, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, MakeWriter,
};
use tracing_subscriber::layer::{Context, Filter, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::errors::SinkError;
use crate::severity::Level;

pub const DEFAULT_SERVICE_NAME: &str = "log-server";
pub const DEFAULT_LOG_FILE: &str = "syslog-ingest.log";

// Sink events carry their exact level as the last target segment,
// e.g. `syslog_ingest::sink::notice`.
const SINK_TARGET: &str = "syslog_ingest::sink";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Name printed in every line.
    pub service_name: String,
    pub log_file: PathBuf,
    pub console_level: Level,
    pub file_level: Level,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            console_level: Level::Info,
            file_level: Level::Debug,
        }
    }
}

pub struct Sink {
    dispatch: Dispatch,
    log_file: Option<Arc<File>>,
}

impl Sink {
    /// Opens (or creates) the log file in append mode and writes the
    /// interactive stream to stderr.
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .map_err(|source| SinkError::OpenLogFile {
                path: config.log_file.clone(),
                source,
            })?;
        let file = Arc::new(file);

        let mut sink = Self::with_writers(
            &config.service_name,
            io::stderr(),
            config.console_level,
            AppendLog(Arc::clone(&file)),
            config.file_level,
        );
        sink.log_file = Some(file);
        Ok(sink)
    }

    /// Builds a sink over arbitrary writers. A failed write on one
    /// destination is reported as an ERROR line on the other.
    pub fn with_writers<C, F>(
        service_name: &str,
        console: C,
        console_level: Level,
        file: F,
        file_level: Level,
    ) -> Self
    where
        C: Write + Send + 'static,
        F: Write + Send + 'static,
    {
        let formatter = LineFormatter::new(service_name);
        let console: SharedWriter = Arc::new(Mutex::new(Box::new(console)));
        let file: SharedWriter = Arc::new(Mutex::new(Box::new(file)));

        let console_layer = tracing_subscriber::fmt::layer()
            .event_format(formatter.clone())
            .with_writer(Destination {
                name: "console",
                writer: Arc::clone(&console),
                fallback: Arc::clone(&file),
                formatter: formatter.clone(),
            })
            .with_filter(MinLevel(console_level));
        let file_layer = tracing_subscriber::fmt::layer()
            .event_format(formatter.clone())
            .with_writer(Destination {
                name: "log file",
                writer: file,
                fallback: console,
                formatter,
            })
            .with_filter(MinLevel(file_level));

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        Self {
            dispatch: Dispatch::new(subscriber),
            log_file: None,
        }
    }

    /// Writes one line. Never fails.
    pub fn log(&self, level: Level, message: &str, origin: &str) {
        tracing::dispatcher::with_default(&self.dispatch, || match level {
            Level::Debug => tracing::debug!(
                target: "syslog_ingest::sink::debug",
                severity = %level, origin, "{}", message
            ),
            Level::Info => tracing::info!(
                target: "syslog_ingest::sink::info",
                severity = %level, origin, "{}", message
            ),
            Level::Notice => tracing::info!(
                target: "syslog_ingest::sink::notice",
                severity = %level, origin, "{}", message
            ),
            Level::Warning => tracing::warn!(
                target: "syslog_ingest::sink::warning",
                severity = %level, origin, "{}", message
            ),
            Level::Error => tracing::error!(
                target: "syslog_ingest::sink::error",
                severity = %level, origin, "{}", message
            ),
            Level::Critical => tracing::error!(
                target: "syslog_ingest::sink::critical",
                severity = %level, origin, "{}", message
            ),
            Level::Alert => tracing::error!(
                target: "syslog_ingest::sink::alert",
                severity = %level, origin, "{}", message
            ),
        });
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Routes every `tracing` event in the process through this sink.
    pub fn install_global(&self) -> Result<(), tracing::dispatcher::SetGlobalDefaultError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
    }

    /// Pushes buffered file data to disk.
    pub fn flush(&self) {
        if let Some(file) = &self.log_file {
            if let Err(e) = file.sync_data() {
                self.log(
                    Level::Error,
                    &format!("Failed to flush log file: {e}"),
                    SINK_TARGET,
                );
            }
        }
    }
}

/// Level an event is filtered on. Sink events carry it in their target;
/// other events map from their `tracing` level, and TRACE is never written.
fn event_level(metadata: &Metadata<'_>) -> Option<Level> {
    if let Some(name) = metadata
        .target()
        .strip_prefix(SINK_TARGET)
        .and_then(|rest| rest.strip_prefix("::"))
    {
        if let Ok(level) = name.parse::<Level>() {
            return Some(level);
        }
    }
    match *metadata.level() {
        tracing::Level::ERROR => Some(Level::Error),
        tracing::Level::WARN => Some(Level::Warning),
        tracing::Level::INFO => Some(Level::Info),
        tracing::Level::DEBUG => Some(Level::Debug),
        tracing::Level::TRACE => None,
    }
}

/// Per-destination filter comparing on the exact [`Level`].
struct MinLevel(Level);

impl<S> Filter<S> for MinLevel {
    fn enabled(&self, metadata: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        event_level(metadata).is_some_and(|level| level >= self.0)
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        Some(LevelFilter::from_level(self.0.as_tracing()))
    }
}

fn tracing_level_name(level: &tracing::Level) -> &'static str {
    match *level {
        tracing::Level::ERROR => "ERROR",
        tracing::Level::WARN => "WARNING",
        tracing::Level::INFO => "INFO",
        tracing::Level::DEBUG | tracing::Level::TRACE => "DEBUG",
    }
}

/// Renders `<timestamp> - <service> - <LEVEL> - [<origin>] <message>`.
///
/// Events emitted by [`Sink::log`] carry `severity` and `origin` fields. Any
/// other event uses its `tracing` level and target instead, and its extra
/// fields are appended as `key=value`.
#[derive(Debug, Clone)]
pub struct LineFormatter {
    service_name: Arc<str>,
}

impl LineFormatter {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: Arc::from(service_name),
        }
    }

    /// One line without its terminator.
    pub fn line(&self, level: &str, origin: &str, message: &str) -> String {
        format!(
            "{} - {} - {} - [{}] {}",
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            self.service_name,
            level,
            origin,
            message
        )
    }
}

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = LineFields::default();
        event.record(&mut fields);

        let metadata = event.metadata();
        let level = fields
            .severity
            .as_deref()
            .unwrap_or_else(|| tracing_level_name(metadata.level()));
        let origin = fields.origin.as_deref().unwrap_or(metadata.target());

        write!(writer, "{}", self.line(level, origin, &fields.message))?;
        for (name, value) in &fields.extra {
            write!(writer, " {name}={value}")?;
        }
        writeln!(writer)
    }
}

#[derive(Default)]
struct LineFields {
    message: String,
    severity: Option<String>,
    origin: Option<String>,
    extra: Vec<(&'static str, String)>,
}

impl Visit for LineFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "severity" => self.severity = Some(value.to_string()),
            "origin" => self.origin = Some(value.to_string()),
            name => self.extra.push((name, value.to_string())),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

fn lock(writer: &SharedWriter) -> MutexGuard<'_, Box<dyn Write + Send>> {
    writer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One output of the sink. Writes never fail: an error is reported on
/// `fallback` and the line is dropped.
#[derive(Clone)]
struct Destination {
    name: &'static str,
    writer: SharedWriter,
    fallback: SharedWriter,
    formatter: LineFormatter,
}

impl Destination {
    fn report(&self, error: &io::Error) {
        let line = self.formatter.line(
            "ERROR",
            SINK_TARGET,
            &format!("Failed to write to {}: {error}", self.name),
        );
        // nowhere left to report a second failure
        let _ = writeln!(lock(&self.fallback), "{line}");
    }
}

impl Write for Destination {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = lock(&self.writer).write_all(buf);
        if let Err(e) = result {
            self.report(&e);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = lock(&self.writer).flush();
        if let Err(e) = result {
            self.report(&e);
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Destination {
    type Writer = Destination;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Append-only file destination.
struct AppendLog(Arc<File>);

impl Write for AppendLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self.0).flush()
    }
}

/// In-memory destination, for embedding and tests.
#[derive(Clone, Default)]
pub struct MemoryWriter(Arc<Mutex<Vec<u8>>>);

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf)
            .lines()
            .map(String::from)
            .collect()
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_sink() -> (Sink, MemoryWriter, MemoryWriter) {
        let console = MemoryWriter::new();
        let file = MemoryWriter::new();
        let sink = Sink::with_writers(
            "log-server",
            console.clone(),
            Level::Info,
            file.clone(),
            Level::Debug,
        );
        (sink, console, file)
    }

    #[test]
    fn test_line_format() {
        let (sink, console, _) = memory_sink();
        sink.log(Level::Warning, "Invalid syslog message: oops", "Syslog-10.0.0.7");

        let lines = console.lines();
        assert_eq!(lines.len(), 1);
        let (timestamp, rest) = lines[0].split_at(23);
        let shape: String = timestamp
            .chars()
            .map(|c| if c.is_ascii_digit() { 'd' } else { c })
            .collect();
        assert_eq!(shape, "dddd-dd-dd dd:dd:dd,ddd");
        assert_eq!(
            rest,
            " - log-server - WARNING - [Syslog-10.0.0.7] Invalid syslog message: oops"
        );
    }

    #[test]
    fn test_destinations_filter_independently() {
        let (sink, console, file) = memory_sink();
        sink.log(Level::Debug, "debug line", "test");
        sink.log(Level::Info, "info line", "test");
        sink.log(Level::Critical, "critical line", "test");

        let console = console.lines();
        let file = file.lines();
        assert_eq!(console.len(), 2);
        assert!(console[0].ends_with("- INFO - [test] info line"));
        assert!(console[1].ends_with("- CRITICAL - [test] critical line"));
        assert_eq!(file.len(), 3);
        assert!(file[0].ends_with("- DEBUG - [test] debug line"));
    }

    #[test]
    fn test_minimum_level_is_exact() {
        let console = MemoryWriter::new();
        let file = MemoryWriter::new();
        let sink = Sink::with_writers(
            "log-server",
            console.clone(),
            Level::Critical,
            file.clone(),
            Level::Notice,
        );
        sink.log(Level::Info, "info line", "o");
        sink.log(Level::Notice, "notice line", "o");
        sink.log(Level::Error, "error line", "o");
        sink.log(Level::Critical, "critical line", "o");
        sink.log(Level::Alert, "alert line", "o");

        let console = console.lines();
        assert_eq!(console.len(), 2);
        assert!(console[0].ends_with("- CRITICAL - [o] critical line"));
        assert!(console[1].ends_with("- ALERT - [o] alert line"));

        let file = file.lines();
        assert_eq!(file.len(), 4);
        assert!(file[0].ends_with("- NOTICE - [o] notice line"));
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_file_write_failure_is_reported_on_console() {
        let console = MemoryWriter::new();
        let sink = Sink::with_writers(
            "log-server",
            console.clone(),
            Level::Info,
            BrokenWriter,
            Level::Debug,
        );
        sink.log(Level::Info, "hello", "o");
        sink.log(Level::Debug, "file only", "o");

        let lines = console.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("- log-server - INFO - [o] hello"));
        for report in &lines[1..] {
            assert!(report.ends_with(
                "- log-server - ERROR - [syslog_ingest::sink] Failed to write to log file: disk full"
            ));
        }
    }

    #[test]
    fn test_console_write_failure_is_reported_to_file() {
        let file = MemoryWriter::new();
        let sink = Sink::with_writers(
            "log-server",
            BrokenWriter,
            Level::Info,
            file.clone(),
            Level::Debug,
        );
        sink.log(Level::Warning, "still recorded", "o");

        let lines = file.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().any(|l| l.ends_with(
            "- ERROR - [syslog_ingest::sink] Failed to write to console: disk full"
        )));
        assert!(lines
            .iter()
            .any(|l| l.ends_with("- WARNING - [o] still recorded")));
    }

    #[test]
    fn test_trace_events_are_not_written() {
        let (sink, console, file) = memory_sink();
        tracing::dispatcher::with_default(sink.dispatch(), || {
            tracing::trace!("too chatty");
        });
        assert!(console.lines().is_empty());
        assert!(file.lines().is_empty());
    }

    #[test]
    fn test_every_level_has_its_own_name() {
        let (sink, _, file) = memory_sink();
        for level in [
            Level::Debug,
            Level::Info,
            Level::Notice,
            Level::Warning,
            Level::Error,
            Level::Critical,
            Level::Alert,
        ] {
            sink.log(level, "x", "o");
        }
        let names: Vec<String> = file
            .lines()
            .iter()
            .map(|l| l.split(" - ").nth(2).unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["DEBUG", "INFO", "NOTICE", "WARNING", "ERROR", "CRITICAL", "ALERT"]
        );
    }

    #[test]
    fn test_plain_tracing_events_use_target_as_origin() {
        let (sink, _, file) = memory_sink();
        tracing::dispatcher::with_default(sink.dispatch(), || {
            tracing::warn!(target: "syslog_ingest::listener", queued = 3, "Queue growing");
        });

        let lines = file.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("- WARNING - [syslog_ingest::listener] Queue growing queued=3"));
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.log");
        std::fs::write(&path, "existing line\n").unwrap();

        let config = SinkConfig {
            log_file: path.clone(),
            // only alerts reach stderr
            console_level: Level::Alert,
            ..SinkConfig::default()
        };
        let sink = Sink::new(&config).unwrap();
        sink.log(Level::Debug, "first", "sourceIP-127.0.0.1");
        sink.log(Level::Info, "second", "sourceIP-127.0.0.1");
        sink.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "existing line");
        assert!(lines[1].ends_with("- log-server - DEBUG - [sourceIP-127.0.0.1] first"));
        assert!(lines[2].ends_with("- log-server - INFO - [sourceIP-127.0.0.1] second"));
    }

    #[test]
    fn test_unopenable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = SinkConfig {
            log_file: dir.path().join("missing").join("ingest.log"),
            ..SinkConfig::default()
        };
        assert!(matches!(
            Sink::new(&config),
            Err(SinkError::OpenLogFile { .. })
        ));
    }
}
