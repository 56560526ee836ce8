// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use syslog_ingest::{
    config::IngestConfig,
    rate_limiter::RateLimitConfig,
    sender::SyslogSender,
    service::{start, IngestHandle},
    severity::Level,
    sink::{MemoryWriter, Sink, SinkConfig},
};
use tokio::{
    net::UdpSocket,
    time::{sleep, timeout},
};

fn test_config(max_per_window: u32, window: Duration) -> IngestConfig {
    IngestConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        recv_timeout: Duration::from_millis(100),
        rate_limit: RateLimitConfig {
            window,
            max_per_window,
        },
        queue_capacity: 100,
        drain_interval: Duration::from_millis(10),
        ..IngestConfig::default()
    }
}

fn memory_sink() -> (Sink, MemoryWriter) {
    let file = MemoryWriter::new();
    let sink = Sink::with_writers(
        "log-server",
        MemoryWriter::new(),
        Level::Info,
        file.clone(),
        Level::Debug,
    );
    (sink, file)
}

async fn wait_for_lines(file: &MemoryWriter, pattern: &str, count: usize) -> Vec<String> {
    let wait = async {
        loop {
            let lines: Vec<String> = file
                .lines()
                .into_iter()
                .filter(|l| l.contains(pattern))
                .collect();
            if lines.len() >= count {
                return lines;
            }
            sleep(Duration::from_millis(10)).await;
        }
    };
    match timeout(Duration::from_secs(5), wait).await {
        Ok(lines) => lines,
        Err(_) => panic!(
            "timed out waiting for {count} lines containing '{pattern}', got {:?}",
            file.lines()
        ),
    }
}

async fn client_for(handle: &IngestHandle) -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("unable to bind UDP socket");
    socket
        .connect(handle.local_addr())
        .await
        .expect("unable to connect UDP socket");
    socket
}

#[tokio::test]
async fn ingest_server_logs_valid_and_invalid_messages() {
    let (sink, file) = memory_sink();
    let handle = start(&test_config(100, Duration::from_secs(1)), sink)
        .await
        .expect("failed to start ingest service");
    let client = client_for(&handle).await;

    client
        .send(b"<34>1 2025-05-05T12:00:00Z host app procid msgid - Test message")
        .await
        .expect("unable to send message");
    client
        .send(b"garbage not a syslog")
        .await
        .expect("unable to send message");

    let records = wait_for_lines(&file, "[sourceIP-127.0.0.1]", 1).await;
    assert!(records[0]
        .ends_with("- CRITICAL - [sourceIP-127.0.0.1] 2025-05-05T12:00:00Z host app procid msgid - Test message"));

    let warnings = wait_for_lines(&file, "Invalid syslog message: garbage not a syslog", 1).await;
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("- WARNING - [Syslog-127.0.0.1]"));

    handle.shutdown().await;
}

#[tokio::test]
async fn over_limit_messages_are_delivered_later_in_order() {
    let (sink, file) = memory_sink();
    // a long window keeps the limiter closed for the whole test
    let handle = start(&test_config(3, Duration::from_secs(60)), sink)
        .await
        .expect("failed to start ingest service");
    let client = client_for(&handle).await;

    for n in 0..8 {
        client
            .send(format!("<14>1 - host app 1 seq - message {n}").as_bytes())
            .await
            .expect("unable to send message");
        // keep the datagrams in order on the loopback socket buffer
        sleep(Duration::from_millis(2)).await;
    }

    let delays = wait_for_lines(&file, "Rate limit exceeded for 127.0.0.1", 5).await;
    assert_eq!(delays.len(), 5);

    let records = wait_for_lines(&file, "[sourceIP-127.0.0.1]", 8).await;
    let order: Vec<String> = records
        .iter()
        .map(|l| l.rsplit(" - ").next().unwrap().to_string())
        .collect();
    assert_eq!(
        order,
        (0..8).map(|n| format!("message {n}")).collect::<Vec<_>>()
    );

    timeout(Duration::from_secs(1), async {
        while !handle.service().deferred().is_empty() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("deferred queue should be empty");

    handle.shutdown().await;
}

#[tokio::test]
async fn sender_round_trip_through_listener() {
    let (sink, file) = memory_sink();
    let handle = start(&test_config(100, Duration::from_secs(1)), sink)
        .await
        .expect("failed to start ingest service");

    let sender = SyslogSender::new(handle.local_addr(), "api-host", "api-server")
        .await
        .expect("failed to create sender");
    sender
        .send(Level::Warning, "req-1", "", "Slow query on student table")
        .await
        .expect("failed to send");

    let records = wait_for_lines(&file, "Slow query on student table", 1).await;
    assert!(records[0].contains("- WARNING - [sourceIP-127.0.0.1]"));
    assert!(records[0].contains(" api-host api-server "));
    assert!(records[0].ends_with(" req-1 - Slow query on student table"));

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_admitting_datagrams() {
    let (sink, file) = memory_sink();
    let handle = start(&test_config(100, Duration::from_secs(1)), sink)
        .await
        .expect("failed to start ingest service");
    let addr = handle.local_addr();
    let service = std::sync::Arc::clone(handle.service());

    timeout(Duration::from_millis(500), handle.shutdown())
        .await
        .expect("shutdown should finish within one receive timeout");
    assert!(service.is_shutting_down());

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    // the socket is closed, so this may or may not error; either way nothing is logged
    let _ = client
        .send_to(b"<14>1 - host app 1 m - after shutdown", addr)
        .await;
    sleep(Duration::from_millis(100)).await;

    assert!(!file.lines().iter().any(|l| l.contains("after shutdown")));
}

#[tokio::test]
async fn file_sink_receives_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingest.log");
    let sink = Sink::new(&SinkConfig {
        log_file: path.clone(),
        console_level: Level::Alert,
        ..SinkConfig::default()
    })
    .expect("failed to open sink");

    let handle = start(&test_config(100, Duration::from_secs(1)), sink)
        .await
        .expect("failed to start ingest service");
    let client = client_for(&handle).await;
    client
        .send(b"<15>1 - host app 1 m - debug detail")
        .await
        .expect("unable to send message");

    timeout(Duration::from_secs(5), async {
        loop {
            let contents = std::fs::read_to_string(&path).unwrap_or_default();
            if contents.contains("debug detail") {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("record should reach the log file");
    handle.shutdown().await;

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents
        .lines()
        .any(|l| l.ends_with("- log-server - DEBUG - [sourceIP-127.0.0.1] - host app 1 m - debug detail")));
}
