// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Blocking and async entry points.
//!
//! Each call opens a fresh session, drives it to completion, tears it down,
//! and only then commits the result to the caller's [`ClockSink`].

use log::{debug, info};
use std::future::Future;
use std::io;
use std::time::Duration;

use crate::calendar::CalendarTimestamp;
use crate::clock::ClockSink;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::runtime;

/// Synchronize `sink` with the configured server, blocking until done.
///
/// Builds a current-thread Tokio runtime for the duration of the call, so it
/// must not be called from inside another Tokio runtime. Use [`synchronize`]
/// there instead.
///
/// With the default configuration both retry loops run forever: an
/// unreachable server blocks this call indefinitely. Set attempt caps on the
/// [`SyncConfig`] or use [`synchronize_time_with_timeout`] to bound it.
///
/// # Examples
///
/// ```no_run
/// use ntp_rtc_client::MemoryClock;
/// use ntp_rtc_client::config::SyncConfig;
///
/// let mut rtc = MemoryClock::new();
/// let now = ntp_rtc_client::synchronize_time(SyncConfig::default(), &mut rtc)?;
/// println!("{now}");
/// # Ok::<(), std::io::Error>(())
/// ```
///
/// # Errors
///
/// Returns an error if the endpoint or runtime cannot be created, an attempt
/// cap runs out, or the sink refuses the timestamp. The underlying
/// [`SyncError`] is available through `io::Error::get_ref`.
pub fn synchronize_time<S: ClockSink>(
    config: SyncConfig,
    sink: &mut S,
) -> io::Result<CalendarTimestamp> {
    block_on(synchronize(config, sink))?
}

/// Like [`synchronize_time`], giving up after `timeout`.
///
/// The timeout covers resolution, every retry, and the reply. On expiry the
/// session is torn down and the sink is left untouched.
pub fn synchronize_time_with_timeout<S: ClockSink>(
    config: SyncConfig,
    sink: &mut S,
    timeout: Duration,
) -> io::Result<CalendarTimestamp> {
    block_on(synchronize_with_timeout(config, sink, timeout))?
}

/// Async version of [`synchronize_time`] for callers already on Tokio.
pub async fn synchronize<S: ClockSink>(
    config: SyncConfig,
    sink: &mut S,
) -> io::Result<CalendarTimestamp> {
    let server = config.server.clone();
    let (mut session, mut events) = runtime::open(config).await?;
    let timestamp = runtime::drive(&mut session, &mut events).await;
    session.shutdown();
    commit(&server, timestamp?, sink)
}

/// Async version of [`synchronize_time_with_timeout`].
pub async fn synchronize_with_timeout<S: ClockSink>(
    config: SyncConfig,
    sink: &mut S,
    timeout: Duration,
) -> io::Result<CalendarTimestamp> {
    let server = config.server.clone();
    let (mut session, mut events) = runtime::open(config).await?;
    let outcome = tokio::time::timeout(timeout, runtime::drive(&mut session, &mut events)).await;
    session.shutdown();
    match outcome {
        Ok(timestamp) => commit(&server, timestamp?, sink),
        Err(_) => {
            debug!("synchronization with {server} timed out after {timeout:?}");
            Err(SyncError::Timeout.into())
        }
    }
}

fn commit<S: ClockSink>(
    server: &str,
    timestamp: CalendarTimestamp,
    sink: &mut S,
) -> io::Result<CalendarTimestamp> {
    sink.commit(&timestamp).map_err(SyncError::Clock)?;
    info!("clock set from {server}: {timestamp}");
    Ok(timestamp)
}

fn block_on<F: Future>(future: F) -> io::Result<F::Output> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(SyncError::Transport)?;
    Ok(rt.block_on(future))
}
