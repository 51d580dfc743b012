// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! NTP wire codec and calendar conversion for a minimal SNTP client.
//!
//! This crate holds the pure, timing-independent pieces: building the 48-byte
//! client request, validating a server reply, and turning the reply's receive
//! timestamp into the broken-down calendar fields a real-time clock expects.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Calendar timestamps and fixed local-offset conversion.
pub mod calendar;

/// Error types for response validation and calendar conversion.
pub mod error;

/// NTP header constants, types, and the request/response codec.
pub mod protocol;

/// NTP and Unix epoch conversions.
pub mod unix_time;
