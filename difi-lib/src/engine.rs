//! The pull based DIFI receive engine.
//!
//! Each call to [Engine::pull] consumes at most one packet from the transport. Data
//! packets produce samples, context packets update the pending context, and anything
//! noteworthy along the way is delivered to a [TagSink] anchored at the absolute index
//! of the sample it applies to.
use std::io::Read;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::{ContextDecoder, ContextSnapshot};
use crate::event::{MetadataEvent, SequenceAnomaly, Tag, TagSink};
use crate::framing::{frame, MAX_PACKET_LEN};
use crate::packet::{PacketHeader, Timestamp};
use crate::prelude::*;
use crate::sequence::{missing_packets, SequenceCheck, SequenceTracker};
use crate::transport::{ReaderTransport, Transport};
use crate::unpack::{IqSample, Unpacker};

/// Outcome of a single [Engine::pull].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// A data packet was processed and this many samples written. May be 0 while
    /// sample output is paused.
    Samples(usize),
    /// No packet was available.
    Idle,
    /// A packet was consumed without producing samples; pull again.
    Again,
}

/// Running counters for an [Engine].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    /// Packets with a complete header, including filtered ones.
    pub packets: u64,
    pub data_packets: u64,
    pub context_packets: u64,
    /// Packets discarded for a stream id mismatch, a short read, or being shorter
    /// than a header.
    pub dropped: u64,
    pub samples: u64,
    /// Sequence anomaly events, including the one for the first data packet.
    pub sequence_anomalies: u64,
    /// Total packet counts skipped across all gaps.
    pub missing: u64,
    pub static_changes: u64,
    /// Context snapshots delivered to the sink.
    pub context_snapshots: u64,
    pub bytes: u64,
}

/// Receives DIFI packets from a [Transport] and turns them into samples and tags.
///
/// # Example
/// Replay a capture of back to back packets.
/// ```
/// use difi::{Config, Engine, Pull, Tag};
/// use num_complex::Complex;
///
/// #[rustfmt::skip]
/// let capture: &[u8] = &[
///     0x18, 0xe0, 0x00, 0x08, // data packet, 8 words
///     0x00, 0x00, 0x00, 0x01, // stream id
///     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // class id
///     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // timestamp
///     0x00, 0x01, 0xff, 0xff, // I=1, Q=-1
/// ];
///
/// let mut engine = Engine::from_reader(Config::default(), capture);
/// let mut out = vec![Complex::<f32>::default(); 16];
/// let mut tags: Vec<Tag> = Vec::new();
///
/// assert_eq!(engine.pull(&mut out, &mut tags).unwrap(), Pull::Samples(1));
/// assert_eq!(out[0], Complex::new(1.0, -1.0));
/// assert_eq!(tags.len(), 1);
/// assert_eq!(engine.pull(&mut out, &mut tags).unwrap(), Pull::Idle);
/// ```
pub struct Engine<T: IqSample> {
    config: Config,
    transport: Transport,
    buf: Vec<u8>,
    tracker: SequenceTracker,
    context: ContextDecoder,
    unpacker: Unpacker<T>,
    send_enabled: bool,
    pending: Option<ContextSnapshot>,
    latched: Timestamp,
    produced: u64,
    halted: bool,
    stats: Stats,
}

impl<T: IqSample> Engine<T> {
    /// Create an engine receiving from the socket described by `config`.
    ///
    /// # Errors
    /// If the address is invalid or the socket cannot be bound.
    pub fn new(config: Config) -> Result<Self> {
        let transport = Transport::open(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create an engine receiving from `transport`. The transport kind in `config` is
    /// not used.
    #[must_use]
    pub fn with_transport(config: Config, transport: Transport) -> Self {
        debug!(?config, ?transport, "creating engine");
        Engine {
            context: ContextDecoder::new(config.bit_depth, config.context_policy),
            unpacker: Unpacker::new(config.bit_depth),
            config,
            transport,
            buf: vec![0u8; MAX_PACKET_LEN],
            tracker: SequenceTracker::default(),
            send_enabled: true,
            pending: None,
            latched: Timestamp::default(),
            produced: 0,
            halted: false,
            stats: Stats::default(),
        }
    }

    /// Create an engine reading a stream of back to back packets from `reader`.
    pub fn from_reader<R>(config: Config, reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::with_transport(config, Transport::stream(ReaderTransport::new(reader)))
    }

    /// Consume at most one packet, writing up to `out.len()` samples and delivering
    /// any tags to `sink`.
    ///
    /// # Errors
    /// [Error::Io] for transport failures, which may be retried. A fatal context
    /// validation error is returned once, after which every call returns
    /// [Error::Halted].
    pub fn pull<S>(&mut self, out: &mut [T], sink: &mut S) -> Result<Pull>
    where
        S: TagSink + ?Sized,
    {
        if self.halted {
            return Err(Error::Halted);
        }
        match self.pull_packet(out, sink) {
            Err(err) if err.is_fatal() => {
                self.halted = true;
                Err(err)
            }
            zult => zult,
        }
    }

    fn pull_packet<S>(&mut self, out: &mut [T], sink: &mut S) -> Result<Pull>
    where
        S: TagSink + ?Sized,
    {
        let framed = frame(&mut self.transport, &mut self.buf)?;
        if framed.is_empty() {
            return Ok(Pull::Idle);
        }
        if framed.is_short() {
            warn!(
                got = framed.len,
                declared = ?framed.declared,
                "short packet read; discarding"
            );
            self.stats.dropped += 1;
            return Ok(Pull::Idle);
        }

        let len = framed.len;
        let Some(header) = PacketHeader::decode(&self.buf[..len]) else {
            warn!(len, minimum = PacketHeader::LEN, "packet too short for a header; discarding");
            self.stats.dropped += 1;
            return Ok(Pull::Again);
        };
        self.stats.packets += 1;
        self.stats.bytes += len as u64;

        if let Some(wanted) = self.config.stream_id {
            if header.stream_id != wanted {
                warn!(
                    got = header.stream_id,
                    wanted, "dropping packet with unexpected stream id"
                );
                self.stats.dropped += 1;
                return Ok(Pull::Again);
            }
        }

        if header.is_data() {
            Ok(self.handle_data(&header, len, out, sink))
        } else {
            self.handle_context(&header, len)?;
            Ok(Pull::Again)
        }
    }

    fn handle_data<S>(&mut self, header: &PacketHeader, len: usize, out: &mut [T], sink: &mut S) -> Pull
    where
        S: TagSink + ?Sized,
    {
        self.stats.data_packets += 1;
        self.latched = header.timestamp;
        let offset = self.produced;

        if let Some(bits) = self.tracker.static_change(header.static_bits) {
            self.stats.static_changes += 1;
            sink.tag(Tag {
                offset,
                event: MetadataEvent::StaticChange(bits),
            });
        }

        // attached while paused too
        if let Some(snapshot) = self.pending.take() {
            self.stats.context_snapshots += 1;
            sink.tag(Tag {
                offset,
                event: MetadataEvent::from(Box::new(snapshot)),
            });
        }

        let last = self.tracker.last_pkt_n();
        let expected = match self.tracker.check(header.pkt_n) {
            SequenceCheck::InOrder => None,
            SequenceCheck::Initial => {
                debug!(pkt_n = header.pkt_n, "first data packet");
                Some(header.pkt_n)
            }
            SequenceCheck::Gap { expected } => {
                if let Some(last) = last {
                    self.stats.missing += u64::from(missing_packets(header.pkt_n, last));
                }
                Some(expected)
            }
        };
        if let Some(expected) = expected {
            self.stats.sequence_anomalies += 1;
            sink.tag(Tag {
                offset,
                event: MetadataEvent::from(SequenceAnomaly {
                    expected,
                    actual: header.pkt_n,
                    data_len: len,
                    timestamp: header.timestamp,
                }),
            });
        }

        if !self.send_enabled {
            return Pull::Samples(0);
        }
        let n = self
            .unpacker
            .unpack(&self.buf[PacketHeader::LEN..len], out);
        self.produced += n as u64;
        self.stats.samples += n as u64;
        Pull::Samples(n)
    }

    fn handle_context(&mut self, header: &PacketHeader, len: usize) -> Result<()> {
        self.stats.context_packets += 1;
        let outcome = self
            .context
            .decode(&self.buf[..len], header, self.latched)?;

        if let Some(enabled) = outcome.send_enabled {
            if enabled != self.send_enabled {
                info!(enabled, "sample output state changed");
            }
            self.send_enabled = enabled;
        }
        if let Some(snapshot) = outcome.snapshot {
            if self.pending.replace(snapshot).is_some() {
                debug!("replacing undelivered context");
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// False while a failed context validation has paused sample output.
    #[must_use]
    pub fn send_enabled(&self) -> bool {
        self.send_enabled
    }

    /// Total samples produced; the offset the next sample will be tagged at.
    #[must_use]
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Timestamp of the most recent data packet.
    #[must_use]
    pub fn latched_timestamp(&self) -> Timestamp {
        self.latched
    }

    /// Context waiting to be attached to the next data packet.
    #[must_use]
    pub fn pending_context(&self) -> Option<&ContextSnapshot> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

impl<T: IqSample> std::fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("unpacker", &self.unpacker)
            .field("send_enabled", &self.send_enabled)
            .field("produced", &self.produced)
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}
