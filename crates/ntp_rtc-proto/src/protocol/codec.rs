// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

use core::net::SocketAddr;

use byteorder::{BigEndian, ByteOrder};

use super::{
    Header, LeapIndicator, Mode, PACKET_LEN, RECEIVE_TIMESTAMP_OFFSET, STRATUM_OFFSET, Stratum,
    Version, pack_header,
};
use crate::error::ValidationError;

/// Build the client request datagram.
///
/// The first octet is `0x1B` (LI=0, VN=3, Mode=client); every other octet is
/// zero. Servers answer a zero transmit timestamp just fine, and the client
/// does not use the origin timestamp for anything.
pub fn encode_request() -> [u8; PACKET_LEN] {
    let mut buf = [0u8; PACKET_LEN];
    buf[0] = pack_header(Header {
        leap_indicator: LeapIndicator::NoWarning,
        version: Version::V3,
        mode: Mode::Client,
    });
    buf
}

/// Validate a server reply and extract the receive timestamp seconds.
///
/// `source` is where the datagram came from, `expected` is where the request
/// was sent. Checks run in this order: source address and port, exact
/// length, server mode, non-zero stratum. The returned value is the raw
/// 32-bit count of seconds since 1900-01-01T00:00:00Z found at byte offset 40.
pub fn decode_response(
    bytes: &[u8],
    source: SocketAddr,
    expected: SocketAddr,
) -> Result<u32, ValidationError> {
    if source != expected {
        return Err(ValidationError::AddressMismatch {
            expected,
            received: source,
        });
    }

    if bytes.len() != PACKET_LEN {
        return Err(ValidationError::LengthMismatch {
            received: bytes.len(),
        });
    }

    let mode = Mode::from(bytes[0]);
    if mode != Mode::Server {
        return Err(ValidationError::ModeMismatch { mode: mode as u8 });
    }

    if !Stratum(bytes[STRATUM_OFFSET]).is_usable() {
        return Err(ValidationError::StratumInvalid);
    }

    Ok(BigEndian::read_u32(
        &bytes[RECEIVE_TIMESTAMP_OFFSET..RECEIVE_TIMESTAMP_OFFSET + 4],
    ))
}
