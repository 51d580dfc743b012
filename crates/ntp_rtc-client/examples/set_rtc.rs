// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

// Set an in-memory real-time clock from a time server.
//
// Usage: cargo run -p ntp_rtc-client --example set_rtc [HOST]
//
// Retries every 10 seconds until the server answers, or gives up after a
// minute. RUST_LOG=debug shows each lookup, request, and discarded reply.

use std::time::Duration;

use ntp_rtc_client::MemoryClock;
use ntp_rtc_client::calendar::LocalOffset;
use ntp_rtc_client::config::{DEFAULT_SERVER, SyncConfig};
use ntp_rtc_client::error::SyncError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let server = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let config = SyncConfig::builder()
        .server(server)
        .local_offset(LocalOffset::MOUNTAIN_DAYLIGHT)
        .build()
        .map_err(SyncError::from)?;

    let rtc = MemoryClock::new();
    ntp_rtc_client::synchronize_time_with_timeout(
        config,
        &mut rtc.clone(),
        Duration::from_secs(60),
    )?;

    if let Some(now) = rtc.read() {
        println!("RTC set to {now}");
    }
    Ok(())
}
