// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! The 48-byte NTP header as used by a single-shot SNTP client.
//!
//! Only the fields this client produces or validates are modelled: the
//! `LI/VN/Mode` octet, the stratum, and the receive timestamp seconds. Every
//! other header field is zero on the way out and ignored on the way in.

/// NTP port number.
pub const PORT: u16 = 123;

/// Length of an NTP header without extension fields or MAC.
pub const PACKET_LEN: usize = 48;

/// Byte offset of the stratum octet.
pub const STRATUM_OFFSET: usize = 1;

/// Byte offset of the receive timestamp seconds field (big-endian `u32`).
pub const RECEIVE_TIMESTAMP_OFFSET: usize = 40;

mod codec;
mod types;

pub use self::codec::*;
pub use self::types::*;
