// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for the synchronization client.
//!
//! Public entry points return `io::Result<T>`. Internally, failures are
//! constructed as [`SyncError`] variants and converted to `io::Error` via
//! `From<SyncError> for io::Error`, so callers can still match on them:
//!
//! ```no_run
//! use ntp_rtc_client::MemoryClock;
//! use ntp_rtc_client::config::SyncConfig;
//! use ntp_rtc_client::error::SyncError;
//!
//! let config = SyncConfig::builder().max_resolution_attempts(3).build().unwrap();
//! let mut rtc = MemoryClock::new();
//! if let Err(e) = ntp_rtc_client::synchronize_time(config, &mut rtc) {
//!     match e.get_ref().and_then(|inner| inner.downcast_ref::<SyncError>()) {
//!         Some(SyncError::Exhausted { kind, attempts }) => {
//!             eprintln!("gave up after {attempts} {kind} attempts")
//!         }
//!         _ => eprintln!("sync failed: {e}"),
//!     }
//! }
//! ```
//!
//! Transient failures (a lookup that returns nothing, a malformed or foreign
//! datagram) never appear here: the session discards them and lets its retry
//! timers drive progress.

// Re-export proto error types.
pub use ntp_rtc_proto::error::{CalendarError, ValidationError};

use std::fmt;
use std::io;

use crate::scheduler::TimerKind;

/// Errors that end a synchronization attempt.
#[derive(Debug)]
pub enum SyncError {
    /// Invalid configuration.
    Config(ConfigError),
    /// The datagram endpoint (or the runtime hosting it) could not be created.
    Transport(io::Error),
    /// A configured attempt cap was reached without success.
    Exhausted {
        /// Which retry loop ran out.
        kind: TimerKind,
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// The caller's deadline elapsed before a valid response arrived.
    Timeout,
    /// The event source shut down before the session finished.
    Abandoned,
    /// The clock sink refused the synchronized timestamp.
    Clock(ClockError),
    /// Any other I/O failure.
    Io(io::Error),
}

/// Configuration errors reported by
/// [`SyncConfigBuilder::build`](crate::config::SyncConfigBuilder::build).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The server hostname is empty.
    EmptyServer,
    /// The retry interval is zero, which would spin.
    ZeroRetryInterval,
    /// An attempt cap of zero would never try at all.
    ZeroAttemptCap {
        /// Which cap was zero.
        kind: TimerKind,
    },
}

/// Errors committing a timestamp to a clock sink.
#[derive(Debug)]
pub enum ClockError {
    /// The operation requires elevated privileges (root/admin).
    PermissionDenied,
    /// Platform-specific error with an OS error code.
    OsError(i32),
    /// Setting the clock is not supported on this platform.
    Unsupported,
    /// The calendar timestamp could not be converted for the sink.
    InvalidTimestamp(CalendarError),
}

// ── Display implementations ─────────────────────────────────────────

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Config(e) => write!(f, "sync config error: {e}"),
            SyncError::Transport(e) => write!(f, "failed to open transport: {e}"),
            SyncError::Exhausted { kind, attempts } => {
                write!(f, "gave up after {attempts} {kind} attempts")
            }
            SyncError::Timeout => write!(f, "time synchronization timed out"),
            SyncError::Abandoned => {
                write!(f, "time synchronization abandoned before completion")
            }
            SyncError::Clock(e) => write!(f, "failed to set clock: {e}"),
            SyncError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyServer => write!(f, "server hostname must not be empty"),
            ConfigError::ZeroRetryInterval => write!(f, "retry interval must be non-zero"),
            ConfigError::ZeroAttemptCap { kind } => {
                write!(f, "{kind} attempt cap must be at least 1")
            }
        }
    }
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::PermissionDenied => write!(f, "permission denied (requires root/admin)"),
            ClockError::OsError(code) => write!(f, "OS error: {code}"),
            ClockError::Unsupported => write!(f, "setting the clock is not supported on this platform"),
            ClockError::InvalidTimestamp(e) => write!(f, "invalid timestamp: {e}"),
        }
    }
}

// ── Error trait implementations ─────────────────────────────────────

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Transport(e) | SyncError::Io(e) => Some(e),
            SyncError::Clock(e) => Some(e),
            SyncError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}

impl std::error::Error for ClockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClockError::InvalidTimestamp(e) => Some(e),
            _ => None,
        }
    }
}

// ── From conversions ────────────────────────────────────────────────

impl From<SyncError> for io::Error {
    fn from(err: SyncError) -> io::Error {
        let kind = match &err {
            SyncError::Config(_) => io::ErrorKind::InvalidInput,
            SyncError::Exhausted { .. } | SyncError::Timeout => io::ErrorKind::TimedOut,
            SyncError::Abandoned => io::ErrorKind::Interrupted,
            SyncError::Clock(ClockError::PermissionDenied) => io::ErrorKind::PermissionDenied,
            SyncError::Clock(ClockError::Unsupported) => io::ErrorKind::Unsupported,
            SyncError::Clock(ClockError::InvalidTimestamp(_)) => io::ErrorKind::InvalidData,
            SyncError::Clock(ClockError::OsError(_)) => io::ErrorKind::Other,
            SyncError::Transport(e) | SyncError::Io(e) => e.kind(),
        };
        // Preserve the original io::Error directly for the Io variant.
        if let SyncError::Io(e) = err {
            return e;
        }
        io::Error::new(kind, err)
    }
}

impl From<io::Error> for SyncError {
    fn from(err: io::Error) -> SyncError {
        SyncError::Io(err)
    }
}

impl From<ConfigError> for SyncError {
    fn from(err: ConfigError) -> SyncError {
        SyncError::Config(err)
    }
}

impl From<ClockError> for SyncError {
    fn from(err: ClockError) -> SyncError {
        SyncError::Clock(err)
    }
}

impl From<CalendarError> for ClockError {
    fn from(err: CalendarError) -> ClockError {
        ClockError::InvalidTimestamp(err)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
