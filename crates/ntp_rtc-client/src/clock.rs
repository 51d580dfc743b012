// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Destinations for the synchronized time.
//!
//! A completed session hands its [`CalendarTimestamp`] to a [`ClockSink`]
//! exactly once. Three sinks are provided:
//!
//! - any `FnMut(&CalendarTimestamp) -> Result<(), ClockError>` closure;
//! - [`MemoryClock`], an in-memory stand-in for RTC hardware;
//! - [`SystemClock`] (feature `clock`), which steps the host's realtime clock.

#![allow(unsafe_code)]

use std::sync::{Arc, Mutex, PoisonError};

use crate::calendar::CalendarTimestamp;
use crate::error::ClockError;

#[cfg(feature = "clock")]
use crate::calendar::{self, LocalOffset};

/// Receives the synchronized calendar time.
pub trait ClockSink {
    /// Program the clock with `timestamp`.
    fn commit(&mut self, timestamp: &CalendarTimestamp) -> Result<(), ClockError>;
}

impl<F> ClockSink for F
where
    F: FnMut(&CalendarTimestamp) -> Result<(), ClockError>,
{
    fn commit(&mut self, timestamp: &CalendarTimestamp) -> Result<(), ClockError> {
        self(timestamp)
    }
}

/// An in-memory real-time clock.
///
/// Clones share storage, so one handle can be given to
/// [`synchronize_time`](crate::synchronize_time) while another reads the
/// result.
#[derive(Clone, Debug, Default)]
pub struct MemoryClock {
    value: Arc<Mutex<Option<CalendarTimestamp>>>,
}

impl MemoryClock {
    /// An unset clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last committed time, or `None` if never set.
    pub fn read(&self) -> Option<CalendarTimestamp> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClockSink for MemoryClock {
    fn commit(&mut self, timestamp: &CalendarTimestamp) -> Result<(), ClockError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(*timestamp);
        Ok(())
    }
}

/// Steps the system realtime clock.
///
/// The calendar fields are converted back to an epoch with the same
/// [`LocalOffset`] that produced them, so configure both to match.
/// Requires root (or `CAP_SYS_TIME`).
#[cfg(feature = "clock")]
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock {
    offset: LocalOffset,
}

#[cfg(feature = "clock")]
impl SystemClock {
    /// A sink that interprets timestamps using `offset`.
    pub fn new(offset: LocalOffset) -> Self {
        SystemClock { offset }
    }
}

#[cfg(feature = "clock")]
impl ClockSink for SystemClock {
    fn commit(&mut self, timestamp: &CalendarTimestamp) -> Result<(), ClockError> {
        let epoch = calendar::calendar_to_approx_unix_epoch(timestamp, self.offset)?;
        platform::set_realtime(epoch)
    }
}

#[cfg(all(feature = "clock", target_os = "linux"))]
mod platform {
    use super::ClockError;

    pub(super) fn set_realtime(epoch: i64) -> Result<(), ClockError> {
        let tp = libc::timespec {
            tv_sec: epoch as libc::time_t,
            tv_nsec: 0,
        };
        let ret = unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &tp) };
        if ret < 0 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(-1);
            if errno == libc::EPERM {
                return Err(ClockError::PermissionDenied);
            }
            return Err(ClockError::OsError(errno));
        }
        Ok(())
    }
}

#[cfg(all(feature = "clock", not(target_os = "linux")))]
mod platform {
    use super::ClockError;

    pub(super) fn set_realtime(_epoch: i64) -> Result<(), ClockError> {
        Err(ClockError::Unsupported)
    }
}
