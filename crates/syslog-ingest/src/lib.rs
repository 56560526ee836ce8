// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Rate-limited syslog ingestion.
//!
//! Datagrams arrive on a UDP [`listener`], are counted per source by the
//! [`rate_limiter`], and are either parsed and written to the [`sink`] at
//! once or parked in the [`deferred_queue`] for the [`drainer`] to write
//! later. [`service::start`] wires it all together.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod deferred_queue;
pub mod drainer;
pub mod errors;
pub mod listener;
pub mod message;
pub mod rate_limiter;
pub mod sender;
pub mod service;
pub mod severity;
pub mod sink;
