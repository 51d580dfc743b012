// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for response validation and calendar conversion.
//!
//! Both types are `no_std`-compatible and allocation free. When the `std`
//! feature is enabled they implement [`std::error::Error`] and convert into
//! [`std::io::Error`].

use core::fmt;
use core::net::SocketAddr;

/// Reasons an incoming datagram is rejected by
/// [`decode_response`](crate::protocol::decode_response).
///
/// None of these are fatal to a synchronization session: the datagram is
/// discarded and the session keeps waiting for the next one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationError {
    /// The datagram did not come from the address and port the request was sent to.
    AddressMismatch {
        /// Where the request was sent.
        expected: SocketAddr,
        /// Where the datagram came from.
        received: SocketAddr,
    },
    /// The payload is not exactly one NTP header long.
    LengthMismatch {
        /// Number of bytes received.
        received: usize,
    },
    /// The reply mode is not "server".
    ModeMismatch {
        /// The raw 3-bit mode found in the reply.
        mode: u8,
    },
    /// Stratum 0: kiss-o'-death or unsynchronized server.
    StratumInvalid,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::AddressMismatch { expected, received } => {
                write!(
                    f,
                    "response from unexpected source {received} (expected {expected})"
                )
            }
            ValidationError::LengthMismatch { received } => {
                write!(f, "NTP response has wrong length ({received} bytes, expected 48)")
            }
            ValidationError::ModeMismatch { mode } => {
                write!(f, "unexpected response mode {mode} (expected server)")
            }
            ValidationError::StratumInvalid => {
                write!(f, "server reports stratum 0 (unsynchronized or kiss-o'-death)")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ValidationError {}

#[cfg(feature = "std")]
impl From<ValidationError> for std::io::Error {
    fn from(err: ValidationError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

/// Errors converting between calendar fields and epoch seconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CalendarError {
    /// A calendar field is outside its valid range.
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },
    /// The instant cannot be represented as a calendar timestamp.
    OutOfRange {
        /// Unix seconds that failed to convert.
        seconds: i64,
    },
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarError::InvalidField { field, value } => {
                write!(f, "invalid {field} value: {value}")
            }
            CalendarError::OutOfRange { seconds } => {
                write!(f, "unix time {seconds} is outside the calendar range")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CalendarError {}

#[cfg(feature = "std")]
impl From<CalendarError> for std::io::Error {
    fn from(err: CalendarError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
    }
}
