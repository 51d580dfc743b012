// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Calendar timestamps for real-time-clock hardware.
//!
//! An RTC is programmed with broken-down local calendar fields rather than an
//! epoch count. This module converts NTP seconds into those fields and back,
//! applying a fixed [`LocalOffset`].
//!
//! The offset is a pair of constants (standard-time offset and daylight-saving
//! advance). There is no timezone database and no daylight-saving schedule:
//! a device configured for daylight time stays on daylight time all year.
//! That is why the reverse direction is named
//! [`calendar_to_approx_unix_epoch`].

use core::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Timelike};

use crate::error::CalendarError;
use crate::unix_time;

/// A fixed local-time offset.
///
/// `standard` is how many seconds local standard time is *behind* UTC
/// (positive west of Greenwich), `daylight` is the daylight-saving advance.
/// Local time is `unix - standard + daylight`.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct LocalOffset {
    /// Seconds local standard time lags UTC.
    pub standard: i32,
    /// Seconds added for daylight saving time.
    pub daylight: i32,
}

impl LocalOffset {
    /// Coordinated Universal Time.
    pub const UTC: Self = LocalOffset {
        standard: 0,
        daylight: 0,
    };

    /// US Mountain time with daylight saving applied (UTC-6).
    pub const MOUNTAIN_DAYLIGHT: Self = LocalOffset {
        standard: 7 * 60 * 60,
        daylight: 60 * 60,
    };

    /// Create an offset from its standard and daylight components.
    pub const fn new(standard: i32, daylight: i32) -> Self {
        LocalOffset { standard, daylight }
    }

    /// Net seconds to add to UTC to obtain local time.
    pub const fn net_seconds(&self) -> i64 {
        self.daylight as i64 - self.standard as i64
    }
}

/// Broken-down calendar time as consumed by RTC hardware.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct CalendarTimestamp {
    /// Full year, e.g. 2026.
    pub year: i16,
    /// Month of the year, 1-12.
    pub month: u8,
    /// Day of the month, 1-31.
    pub day: u8,
    /// Day of the week, 0-6 with 0 = Sunday.
    pub weekday: u8,
    /// Hour, 0-23.
    pub hour: u8,
    /// Minute, 0-59.
    pub minute: u8,
    /// Second, 0-59.
    pub second: u8,
}

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

impl fmt::Display for CalendarTimestamp {
    /// Formats as `Tuesday 17 October 14:03:05 2026`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let weekday = WEEKDAYS.get(self.weekday as usize).unwrap_or(&"?");
        let month = MONTHS
            .get((self.month as usize).wrapping_sub(1))
            .unwrap_or(&"?");
        write!(
            f,
            "{} {} {} {}:{:02}:{:02} {}",
            weekday, self.day, month, self.hour, self.minute, self.second, self.year
        )
    }
}

/// Convert Unix seconds (already shifted to local time) to calendar fields.
pub fn unix_seconds_to_calendar(seconds: i64) -> Result<CalendarTimestamp, CalendarError> {
    let out_of_range = CalendarError::OutOfRange { seconds };
    let dt = DateTime::from_timestamp(seconds, 0)
        .ok_or(out_of_range)?
        .naive_utc();
    let year = i16::try_from(dt.year()).map_err(|_| out_of_range)?;
    Ok(CalendarTimestamp {
        year,
        month: dt.month() as u8,
        day: dt.day() as u8,
        weekday: dt.weekday().num_days_from_sunday() as u8,
        hour: dt.hour() as u8,
        minute: dt.minute() as u8,
        second: dt.second() as u8,
    })
}

/// Convert NTP seconds since 1900 to local calendar fields.
///
/// The 1900→1970 delta is removed in 64-bit arithmetic, then `offset` is
/// applied.
pub fn ntp_seconds_to_calendar(
    seconds_since_1900: u32,
    offset: LocalOffset,
) -> Result<CalendarTimestamp, CalendarError> {
    let unix = unix_time::ntp_to_unix_seconds(seconds_since_1900);
    unix_seconds_to_calendar(unix + offset.net_seconds())
}

/// Convert local calendar fields back to Unix seconds.
///
/// `weekday` is ignored. Fields are range-checked rather than normalized, so
/// `month: 13` is an error instead of January of the following year. The
/// result is only as accurate as `offset`: no timezone rules are consulted.
pub fn calendar_to_approx_unix_epoch(
    timestamp: &CalendarTimestamp,
    offset: LocalOffset,
) -> Result<i64, CalendarError> {
    let invalid = |field: &'static str, value: u8| CalendarError::InvalidField {
        field,
        value: value as i64,
    };
    if !(1..=12).contains(&timestamp.month) {
        return Err(invalid("month", timestamp.month));
    }
    let date = NaiveDate::from_ymd_opt(
        timestamp.year as i32,
        timestamp.month as u32,
        timestamp.day as u32,
    )
    .ok_or(invalid("day", timestamp.day))?;
    if timestamp.hour > 23 {
        return Err(invalid("hour", timestamp.hour));
    }
    if timestamp.minute > 59 {
        return Err(invalid("minute", timestamp.minute));
    }
    let local = date
        .and_hms_opt(
            timestamp.hour as u32,
            timestamp.minute as u32,
            timestamp.second as u32,
        )
        .ok_or(invalid("second", timestamp.second))?
        .and_utc()
        .timestamp();
    Ok(local - offset.net_seconds())
}
