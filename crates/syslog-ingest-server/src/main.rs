// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use anyhow::Context;
use tracing::{debug, info};

use syslog_ingest::{config::IngestConfig, service, sink::Sink};

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let config = IngestConfig::from_env().context("invalid syslog ingest configuration")?;

    let sink = Sink::new(&config.sink).context("unable to open log sink")?;
    sink.install_global()
        .context("setting default subscriber failed")?;

    debug!("Logging subsystem enabled");

    // A bind failure ends the process with a non-zero status.
    let handle = service::start(&config, sink)
        .await
        .with_context(|| format!("unable to start syslog listener on {}:{}", config.host, config.port))?;

    tokio::signal::ctrl_c()
        .await
        .context("unable to listen for shutdown signal")?;

    info!("Shutting down syslog listener on {}", handle.local_addr());
    handle.shutdown().await;

    Ok(())
}
