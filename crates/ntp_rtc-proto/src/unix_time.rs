// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

/// The number of seconds from 1st January 1900 UTC to the start of the Unix epoch.
pub const EPOCH_DELTA: i64 = 2_208_988_800;

/// Convert NTP era-0 seconds (since 1900) to Unix seconds (since 1970).
///
/// The subtraction happens in `i64`, so every `u32` input is representable.
/// Values below [`EPOCH_DELTA`] give negative (pre-1970) results; a real
/// server never sends those. No era disambiguation is attempted: timestamps
/// after 2036-02-07 wrap back to 1900.
pub fn ntp_to_unix_seconds(ntp_seconds: u32) -> i64 {
    ntp_seconds as i64 - EPOCH_DELTA
}

/// Convert Unix seconds to NTP era-0 seconds.
///
/// Returns `None` when the instant lies outside era 0
/// (1900-01-01 through 2036-02-07T06:28:15Z).
pub fn unix_to_ntp_seconds(unix_seconds: i64) -> Option<u32> {
    u32::try_from(unix_seconds.checked_add(EPOCH_DELTA)?).ok()
}
