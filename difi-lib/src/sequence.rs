//! Data packet sequence and static header bit tracking.
use tracing::warn;

use crate::packet::PacketHeader;

/// Result of checking a data packet's packet count against the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// First data packet seen; there is nothing to compare against.
    Initial,
    InOrder,
    /// The count is not the successor of the previous count.
    Gap { expected: u8 },
}

/// Calculate the number of packet counts skipped between `last` and `cur`, modulo 16.
///
/// A repeated count reports 15 missing, i.e., a full wrap.
#[must_use]
pub fn missing_packets(cur: u8, last: u8) -> u8 {
    let m = PacketHeader::PKT_N_MOD;
    (cur % m + m - (last % m) - 1) % m
}

/// Tracks state across data packets: the last packet count and the last static header bits.
#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    last_pkt_n: Option<u8>,
    last_static_bits: Option<u16>,
}

impl SequenceTracker {
    #[must_use]
    pub fn last_pkt_n(&self) -> Option<u8> {
        self.last_pkt_n
    }

    #[must_use]
    pub fn last_static_bits(&self) -> Option<u16> {
        self.last_static_bits
    }

    /// Record `bits`, returning them if they differ from a previously recorded value.
    pub fn static_change(&mut self, bits: u16) -> Option<u16> {
        let changed = match self.last_static_bits {
            Some(last) if last != bits => {
                warn!(last, new = bits, "static header bits changed");
                Some(bits)
            }
            _ => None,
        };
        self.last_static_bits = Some(bits);
        changed
    }

    /// Check `pkt_n` against the previous packet count and record it.
    pub fn check(&mut self, pkt_n: u8) -> SequenceCheck {
        let zult = match self.last_pkt_n {
            None => SequenceCheck::Initial,
            Some(last) => {
                let expected = (last + 1) % PacketHeader::PKT_N_MOD;
                if expected == pkt_n {
                    SequenceCheck::InOrder
                } else {
                    warn!(
                        got = pkt_n,
                        expected,
                        missing = missing_packets(pkt_n, last),
                        "got an out of order packet"
                    );
                    SequenceCheck::Gap { expected }
                }
            }
        };
        self.last_pkt_n = Some(pkt_n);
        zult
    }
}
