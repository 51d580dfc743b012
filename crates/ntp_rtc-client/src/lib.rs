// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

/*!
Retrying SNTP client that sets a real-time clock from a single time server.

A synchronization resolves the server hostname, sends a 48-byte client
request, and waits for a valid server reply. Lookups and requests are retried
on fixed timers until a reply arrives. The reply's receive timestamp is
converted to broken-down local calendar time and committed to a
[`ClockSink`].

# Example

```rust,no_run
use ntp_rtc_client::MemoryClock;
use ntp_rtc_client::calendar::LocalOffset;
use ntp_rtc_client::config::SyncConfig;

fn main() -> std::io::Result<()> {
    let config = SyncConfig::builder()
        .server("pool.ntp.org")
        .local_offset(LocalOffset::MOUNTAIN_DAYLIGHT)
        .max_requests(6)
        .build()
        .map_err(ntp_rtc_client::error::SyncError::from)?;
    let rtc = MemoryClock::new();
    ntp_rtc_client::synchronize_time(config, &mut rtc.clone())?;
    println!("{}", rtc.read().unwrap());
    Ok(())
}
```

# Architecture

The [`session`] module holds a sans-IO state machine driven by events. The
[`runtime`] module supplies the Tokio resolver, datagram endpoint, and timers
that produce those events. Tests drive the same state machine with fakes.

# Feature Flags

| Feature | Default | Description |
|---------|---------|-------------|
| `tokio` | yes | Tokio collaborators and the blocking/async entry points. |
| `clock` | no | [`SystemClock`](clock::SystemClock) sink that steps the host clock (`libc`). |
*/

#![warn(missing_docs)]

// Re-export protocol modules from ntp_rtc_proto for convenience.
pub use ntp_rtc_proto::{calendar, protocol, unix_time};

pub mod error;

/// Session configuration and its builder.
pub mod config;

pub mod scheduler;

pub mod session;

/// Clock sinks that receive the synchronized time.
pub mod clock;

/// Tokio resolver, transport, and alarm plus the event loop.
#[cfg(feature = "tokio")]
pub mod runtime;

#[cfg(feature = "tokio")]
mod sync;

pub use calendar::CalendarTimestamp;
pub use clock::{ClockSink, MemoryClock};

#[cfg(feature = "tokio")]
pub use sync::{
    synchronize, synchronize_time, synchronize_time_with_timeout, synchronize_with_timeout,
};
