//! DIFI context packet decoding.
//!
//! DIFI context packets come in two layouts that can only be told apart by their total
//! length: the standard 108 byte layout, and a 72 byte compact layout that has no
//! timestamp or gain fields. A 44 byte "version flow signal" packet is recognized but not
//! decoded.
#[cfg(feature = "serde")]
use serde::Serialize;
use tracing::{error, trace, warn};

use crate::config::{BitDepth, ContextPolicy};
use crate::fixed::{fixed16_to_f32, fixed64_to_f64, split_gain};
use crate::packet::{be_u32, be_u64, PacketHeader, Timestamp};
use crate::prelude::*;

/// Length of the version flow signal context packet, which is not decoded.
pub const FLOW_SIGNAL_LEN: usize = 44;

/// Context fields from the 72 byte layout.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CompactContext {
    pub class_id: u64,
    /// Not carried by the packet; the timestamp of the last data packet.
    pub timestamp: Timestamp,
    pub cif: u32,
    pub bandwidth: f64,
    pub if_ref_freq: f64,
    pub rf_ref_freq: f64,
    pub if_band_offset: f64,
    pub sample_rate: f64,
    pub state_indicators: u32,
    pub payload_format: u64,
}

impl CompactContext {
    pub const LEN: usize = 72;

    /// Decode from a full packet. `timestamp` is used as the context time.
    #[must_use]
    pub fn decode(buf: &[u8], timestamp: Timestamp) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        Some(CompactContext {
            class_id: be_u64(&buf[8..]),
            timestamp,
            cif: be_u32(&buf[16..]),
            bandwidth: fixed64_to_f64(be_u64(&buf[20..])),
            if_ref_freq: fixed64_to_f64(be_u64(&buf[28..])),
            rf_ref_freq: fixed64_to_f64(be_u64(&buf[36..])),
            if_band_offset: fixed64_to_f64(be_u64(&buf[44..])),
            sample_rate: fixed64_to_f64(be_u64(&buf[52..])),
            state_indicators: be_u32(&buf[60..]),
            payload_format: be_u64(&buf[64..]),
        })
    }
}

/// Context fields from the standard 108 byte layout.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FullContext {
    pub class_id: u64,
    pub timestamp: Timestamp,
    pub cif: u32,
    pub reference_point: u32,
    pub bandwidth: f64,
    pub if_ref_freq: f64,
    pub rf_ref_freq: f64,
    pub if_band_offset: f64,
    pub reference_level: f32,
    /// Stage 1 gain
    pub rf_gain: f32,
    /// Stage 2 gain
    pub if_gain: f32,
    pub sample_rate: f64,
    pub timestamp_adjustment: u64,
    pub timestamp_calibration: u32,
    pub state_indicators: u32,
    pub payload_format: u64,
}

impl FullContext {
    pub const LEN: usize = 108;

    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        let (rf_gain, if_gain) = split_gain(be_u32(&buf[72..]));
        Some(FullContext {
            class_id: be_u64(&buf[8..]),
            timestamp: Timestamp {
                full: be_u32(&buf[16..]),
                frac: be_u64(&buf[20..]),
            },
            cif: be_u32(&buf[28..]),
            reference_point: be_u32(&buf[32..]),
            bandwidth: fixed64_to_f64(be_u64(&buf[36..])),
            if_ref_freq: fixed64_to_f64(be_u64(&buf[44..])),
            rf_ref_freq: fixed64_to_f64(be_u64(&buf[52..])),
            if_band_offset: fixed64_to_f64(be_u64(&buf[60..])),
            reference_level: fixed16_to_f32((be_u32(&buf[68..]) & 0xffff) as u16),
            rf_gain,
            if_gain,
            sample_rate: fixed64_to_f64(be_u64(&buf[76..])),
            timestamp_adjustment: be_u64(&buf[84..]),
            timestamp_calibration: be_u32(&buf[92..]),
            state_indicators: be_u32(&buf[96..]),
            payload_format: be_u64(&buf[100..]),
        })
    }
}

#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum ContextRecord {
    Compact(CompactContext),
    Full(FullContext),
}

impl ContextRecord {
    #[must_use]
    pub fn payload_format(&self) -> u64 {
        match self {
            ContextRecord::Compact(c) => c.payload_format,
            ContextRecord::Full(c) => c.payload_format,
        }
    }

    /// Sample bit depth declared by the data packet payload format field.
    #[must_use]
    pub fn bit_depth(&self) -> u8 {
        declared_bit_depth(self.payload_format())
    }

    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        match self {
            ContextRecord::Compact(c) => c.timestamp,
            ContextRecord::Full(c) => c.timestamp,
        }
    }

    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        match self {
            ContextRecord::Compact(c) => c.sample_rate,
            ContextRecord::Full(c) => c.sample_rate,
        }
    }

    #[must_use]
    pub fn bandwidth(&self) -> f64 {
        match self {
            ContextRecord::Compact(c) => c.bandwidth,
            ContextRecord::Full(c) => c.bandwidth,
        }
    }

    #[must_use]
    pub fn rf_ref_freq(&self) -> f64 {
        match self {
            ContextRecord::Compact(c) => c.rf_ref_freq,
            ContextRecord::Full(c) => c.rf_ref_freq,
        }
    }
}

/// Bit depth from a payload format word: item size minus one in bits 32-36.
#[must_use]
pub fn declared_bit_depth(payload_format: u64) -> u8 {
    ((payload_format >> 32) & 0x1f) as u8 + 1
}

/// A decoded context packet as delivered to the sample consumer.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    /// Header word as received.
    pub header: u32,
    pub stream_id: u32,
    pub record: ContextRecord,
    /// All packet bytes
    pub raw: Vec<u8>,
}

/// What the engine should do with a context packet.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ContextOutcome {
    /// Context to attach to the next data packet, if any.
    pub snapshot: Option<ContextSnapshot>,
    /// New value for the engine's send enabled flag, if it changes.
    pub send_enabled: Option<bool>,
}

/// Decodes context packets and applies the configured [ContextPolicy].
#[derive(Debug, Clone)]
pub struct ContextDecoder {
    bit_depth: BitDepth,
    policy: ContextPolicy,
}

impl ContextDecoder {
    #[must_use]
    pub fn new(bit_depth: BitDepth, policy: ContextPolicy) -> Self {
        ContextDecoder { bit_depth, policy }
    }

    /// Decode the context packet in `pkt`. `latched` provides the timestamp for the compact
    /// layout.
    ///
    /// # Errors
    /// [Error::BitDepthMismatch] or [Error::ContextLength] if validation fails and the
    /// policy is [ContextPolicy::Abort].
    pub fn decode(
        &self,
        pkt: &[u8],
        header: &PacketHeader,
        latched: Timestamp,
    ) -> Result<ContextOutcome> {
        let record = match pkt.len() {
            FLOW_SIGNAL_LEN => {
                warn!("ignoring apparent version flow signal context packet");
                return Ok(ContextOutcome::default());
            }
            CompactContext::LEN => CompactContext::decode(pkt, latched).map(ContextRecord::Compact),
            FullContext::LEN => FullContext::decode(pkt).map(ContextRecord::Full),
            _ => None,
        };
        trace!(len = pkt.len(), ?record, "decoded context");

        let snapshot = record.map(|record| ContextSnapshot {
            header: header.raw,
            stream_id: header.stream_id,
            record,
            raw: pkt.to_vec(),
        });

        if self.policy == ContextPolicy::Ignore {
            return Ok(ContextOutcome {
                snapshot,
                send_enabled: None,
            });
        }

        let Err(err) = self.validate(pkt.len(), snapshot.as_ref()) else {
            return Ok(ContextOutcome {
                snapshot,
                send_enabled: Some(true),
            });
        };

        match self.policy {
            ContextPolicy::Abort => {
                error!(%err, "invalid context packet");
                Err(err)
            }
            ContextPolicy::WarnForward => {
                warn!(%err, "invalid context packet; pausing samples, forwarding context");
                Ok(ContextOutcome {
                    snapshot,
                    send_enabled: Some(false),
                })
            }
            _ => {
                warn!(%err, "invalid context packet; pausing samples, dropping context");
                Ok(ContextOutcome {
                    snapshot: None,
                    send_enabled: Some(false),
                })
            }
        }
    }

    fn validate(&self, len: usize, snapshot: Option<&ContextSnapshot>) -> Result<()> {
        let Some(snapshot) = snapshot else {
            return Err(Error::ContextLength(len));
        };
        let declared = snapshot.record.bit_depth();
        if declared != self.bit_depth.bits() {
            return Err(Error::BitDepthMismatch {
                declared,
                configured: self.bit_depth.bits(),
            });
        }
        Ok(())
    }
}
