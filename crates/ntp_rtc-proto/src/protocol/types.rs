// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

/// A 2-bit integer warning of an impending leap second to be inserted or deleted in the last
/// minute of the current month.
///
/// Note that this field is packed in the actual header.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum LeapIndicator {
    /// No leap required.
    #[default]
    NoWarning = 0,
    /// Last minute of the day has 61 seconds.
    AddOne = 1,
    /// Last minute of the day has 59 seconds.
    SubOne = 2,
    /// Clock unsynchronized.
    Unknown = 3,
}

impl From<u8> for LeapIndicator {
    /// Decodes the low 2 bits of `value`.
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => LeapIndicator::NoWarning,
            1 => LeapIndicator::AddOne,
            2 => LeapIndicator::SubOne,
            _ => LeapIndicator::Unknown,
        }
    }
}

/// A 3-bit integer representing the NTP version number.
///
/// Note that while this struct is 8-bits, this field is packed to 3 in the actual header.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Version(u8);

impl Version {
    /// NTP version 3.
    pub const V3: Self = Version(3);
    /// NTP version 4.
    pub const V4: Self = Version(4);

    /// Create a `Version` from a raw version number.
    ///
    /// Returns `None` if the value does not fit in 3 bits or is zero.
    pub fn new(v: u8) -> Option<Self> {
        if (1..=7).contains(&v) {
            Some(Version(v))
        } else {
            None
        }
    }

    /// Returns the raw version number as a `u8`.
    pub fn value(&self) -> u8 {
        self.0
    }
}

/// A 3-bit integer representing the association mode.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum Mode {
    /// Reserved mode (value 0).
    Reserved = 0,
    /// Symmetric active mode (value 1).
    SymmetricActive = 1,
    /// Symmetric passive mode (value 2).
    SymmetricPassive = 2,
    /// Client mode (value 3).
    #[default]
    Client = 3,
    /// Server mode (value 4).
    Server = 4,
    /// Broadcast mode (value 5).
    Broadcast = 5,
    /// NTP control message mode (value 6).
    NtpControlMessage = 6,
    /// Reserved for private use (value 7).
    ReservedForPrivateUse = 7,
}

impl From<u8> for Mode {
    /// Decodes the low 3 bits of `value`.
    fn from(value: u8) -> Self {
        match value & 0b111 {
            0 => Mode::Reserved,
            1 => Mode::SymmetricActive,
            2 => Mode::SymmetricPassive,
            3 => Mode::Client,
            4 => Mode::Server,
            5 => Mode::Broadcast,
            6 => Mode::NtpControlMessage,
            _ => Mode::ReservedForPrivateUse,
        }
    }
}

/// An 8-bit integer representing the stratum.
///
/// Stratum 0 in a received packet means "unspecified or invalid": either a
/// kiss-o'-death message or a server that has not synchronized yet. It is
/// never an acceptable time source.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Stratum(pub u8);

impl Stratum {
    /// Unspecified or invalid.
    pub const UNSPECIFIED: Self = Stratum(0);
    /// The primary server (e.g. equipped with a GPS receiver).
    pub const PRIMARY: Self = Stratum(1);
    /// An unsynchronized stratum.
    pub const UNSYNCHRONIZED: Self = Stratum(16);

    /// Whether a reply carrying this stratum may be used as a time source.
    pub fn is_usable(&self) -> bool {
        *self != Self::UNSPECIFIED
    }
}

/// The first header octet: `LI(2) VN(3) Mode(3)`.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Header {
    /// Leap indicator.
    pub leap_indicator: LeapIndicator,
    /// Protocol version.
    pub version: Version,
    /// Association mode.
    pub mode: Mode,
}

impl Default for Version {
    fn default() -> Self {
        Version::V3
    }
}

/// Pack a [`Header`] into the first octet of an NTP packet.
pub fn pack_header(header: Header) -> u8 {
    ((header.leap_indicator as u8) << 6)
        | ((header.version.value() & 0b111) << 3)
        | header.mode as u8
}

/// Unpack the first octet of an NTP packet.
///
/// Returns `None` only when the version bits are zero.
pub fn unpack_header(octet: u8) -> Option<Header> {
    Some(Header {
        leap_indicator: LeapIndicator::from(octet >> 6),
        version: Version::new((octet >> 3) & 0b111)?,
        mode: Mode::from(octet),
    })
}
