// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Session configuration.
//!
//! ```
//! use std::time::Duration;
//! use ntp_rtc_client::calendar::LocalOffset;
//! use ntp_rtc_client::config::SyncConfig;
//!
//! let config = SyncConfig::builder()
//!     .server("time.nist.gov")
//!     .retry_interval(Duration::from_secs(5))
//!     .local_offset(LocalOffset::MOUNTAIN_DAYLIGHT)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.port, 123);
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use crate::calendar::LocalOffset;
use crate::error::ConfigError;
use crate::protocol;
use crate::scheduler::TimerKind;

/// Default time server.
pub const DEFAULT_SERVER: &str = "pool.ntp.org";

/// Default interval between retries of either kind.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Default delay between resolving the server and sending the first request.
pub const DEFAULT_FIRST_SEND_DELAY: Duration = Duration::from_millis(1);

/// Validated configuration for one synchronization session.
///
/// Build with [`SyncConfig::builder`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyncConfig {
    /// Hostname (or IP literal) of the time server.
    pub server: String,
    /// UDP port of the time server.
    pub port: u16,
    /// Local address to bind the datagram endpoint to.
    pub bind: SocketAddr,
    /// Interval for both the resolution-retry and request-retry timers.
    pub retry_interval: Duration,
    /// Delay before the first request once the server is resolved.
    pub first_send_delay: Duration,
    /// Fixed offset applied when converting to calendar time.
    pub local_offset: LocalOffset,
    /// Give up after this many lookups. `None` retries forever.
    pub max_resolution_attempts: Option<u32>,
    /// Give up after this many requests. `None` retries forever.
    pub max_requests: Option<u32>,
}

impl SyncConfig {
    /// Create a builder populated with defaults.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }

    /// The attempt cap for a retry loop, if any.
    pub fn attempt_cap(&self, kind: TimerKind) -> Option<u32> {
        match kind {
            TimerKind::Resolution => self.max_resolution_attempts,
            TimerKind::Request => self.max_requests,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            server: DEFAULT_SERVER.to_string(),
            port: protocol::PORT,
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            first_send_delay: DEFAULT_FIRST_SEND_DELAY,
            local_offset: LocalOffset::UTC,
            max_resolution_attempts: None,
            max_requests: None,
        }
    }
}

/// Builder for [`SyncConfig`].
#[derive(Clone, Debug)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    fn new() -> Self {
        SyncConfigBuilder {
            config: SyncConfig::default(),
        }
    }

    /// Set the time server hostname or IP literal (default: `pool.ntp.org`).
    pub fn server(mut self, host: impl Into<String>) -> Self {
        self.config.server = host.into();
        self
    }

    /// Set the server port (default: 123).
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the local bind address (default: `0.0.0.0:0`).
    ///
    /// The address family also selects which resolved server addresses are
    /// usable.
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.bind = addr;
        self
    }

    /// Set the retry interval for both retry loops (default: 10s).
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_interval = interval;
        self
    }

    /// Set the delay before the first request (default: 1ms).
    pub fn first_send_delay(mut self, delay: Duration) -> Self {
        self.config.first_send_delay = delay;
        self
    }

    /// Set the fixed local-time offset (default: UTC).
    pub fn local_offset(mut self, offset: LocalOffset) -> Self {
        self.config.local_offset = offset;
        self
    }

    /// Stop after `attempts` lookups instead of retrying forever.
    pub fn max_resolution_attempts(mut self, attempts: u32) -> Self {
        self.config.max_resolution_attempts = Some(attempts);
        self
    }

    /// Stop after `requests` request datagrams instead of retrying forever.
    pub fn max_requests(mut self, requests: u32) -> Self {
        self.config.max_requests = Some(requests);
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let config = self.config;
        if config.server.trim().is_empty() {
            return Err(ConfigError::EmptyServer);
        }
        if config.retry_interval.is_zero() {
            return Err(ConfigError::ZeroRetryInterval);
        }
        for kind in [TimerKind::Resolution, TimerKind::Request] {
            if config.attempt_cap(kind) == Some(0) {
                return Err(ConfigError::ZeroAttemptCap { kind });
            }
        }
        Ok(config)
    }
}
