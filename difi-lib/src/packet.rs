//! DIFI packet header decoding.
//!
//! All fields are big-endian at fixed offsets:
//!
//! | bytes   | field                                               |
//! |---------|-----------------------------------------------------|
//! | `0..4`  | header word: type (31-28), static bits (31-20), pkt count (19-16), size in words (15-0) |
//! | `4..8`  | stream id                                           |
//! | `8..16` | class id                                            |
//! | `16..20`| integer timestamp (seconds)                         |
//! | `20..28`| fractional timestamp (picoseconds)                  |
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// VITA-49 packet type from the top 4 bits of the header word.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Signal data packet with stream id.
    Data,
    /// Context packet.
    Context,
    /// Extension context packet.
    ExtensionContext,
    Other(u8),
}

impl From<u8> for PacketType {
    fn from(value: u8) -> Self {
        match value {
            0x1 => PacketType::Data,
            0x4 => PacketType::Context,
            0x5 => PacketType::ExtensionContext,
            x => PacketType::Other(x),
        }
    }
}

/// Packet time: integer seconds plus fractional picoseconds.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub full: u32,
    pub frac: u64,
}

impl Timestamp {
    const PICOS_PER_NANO: u64 = 1_000;

    #[must_use]
    pub fn new(full: u32, frac: u64) -> Self {
        Timestamp { full, frac }
    }

    /// Convert to a UTC [hifitime::Epoch], assuming `full` counts seconds since the
    /// UNIX epoch. Sub-nanosecond precision is truncated.
    #[cfg(feature = "timecode")]
    #[must_use]
    pub fn epoch(&self) -> hifitime::Epoch {
        let nanos = self.frac / Self::PICOS_PER_NANO;
        hifitime::Epoch::from_unix_seconds(f64::from(self.full))
            + hifitime::Duration::from_total_nanoseconds(i128::from(nanos))
    }
}

/// Fixed header fields common to DIFI data and context packets.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: PacketType,
    /// Rolling 4-bit packet count.
    pub pkt_n: u8,
    /// Bits 31-20 of the header word, shifted down.
    pub static_bits: u16,
    /// Packet size in 32-bit words, including the header word.
    pub size_words: u16,
    pub stream_id: u32,
    pub timestamp: Timestamp,
    /// Header word as received.
    pub raw: u32,
}

impl PacketHeader {
    /// Bytes before the payload of a data packet.
    pub const LEN: usize = 28;
    /// Modulus of the packet count.
    pub const PKT_N_MOD: u8 = 16;

    /// Decode from bytes. Returns `None` if there are fewer than [PacketHeader::LEN] bytes.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        let raw = be_u32(&buf[0..4]);

        Some(PacketHeader {
            packet_type: PacketType::from((raw >> 28) as u8),
            pkt_n: ((raw >> 16) & 0xf) as u8,
            static_bits: (raw >> 20) as u16,
            size_words: size_words(raw),
            stream_id: be_u32(&buf[4..8]),
            timestamp: Timestamp {
                full: be_u32(&buf[16..20]),
                frac: be_u64(&buf[20..28]),
            },
            raw,
        })
    }

    #[must_use]
    pub fn is_data(&self) -> bool {
        self.packet_type == PacketType::Data
    }

    /// Packet length in bytes according to the header.
    #[must_use]
    pub fn declared_len(&self) -> usize {
        usize::from(self.size_words) * 4
    }
}

/// Packet size in 32-bit words from the low 16 bits of a header word.
#[must_use]
pub fn size_words(header: u32) -> u16 {
    (header & 0xffff) as u16
}

// Callers guarantee slice lengths
pub(crate) fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

pub(crate) fn be_u64(b: &[u8]) -> u64 {
    u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}
