//! Metadata events delivered alongside the sample stream.
use crossbeam::channel::Sender;
use derive_more::From;
#[cfg(feature = "serde")]
use serde::Serialize;
use tracing::debug;

use crate::context::ContextSnapshot;
use crate::packet::Timestamp;

/// A data packet whose packet count was not the expected successor, or the first
/// data packet of a stream, in which case `expected == actual`.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceAnomaly {
    pub expected: u8,
    pub actual: u8,
    /// Length in bytes of the packet that triggered the event.
    pub data_len: usize,
    pub timestamp: Timestamp,
}

impl SequenceAnomaly {
    /// True for the announcement made on the first data packet.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.expected == self.actual
    }
}

#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq, From)]
pub enum MetadataEvent {
    /// New value of the static header bits (header word bits 31-20).
    StaticChange(u16),
    ContextSnapshot(Box<ContextSnapshot>),
    SequenceAnomaly(SequenceAnomaly),
}

/// A [MetadataEvent] anchored to the absolute index of the sample it applies to.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub offset: u64,
    pub event: MetadataEvent,
}

/// Receives tags produced by an [crate::Engine].
pub trait TagSink {
    fn tag(&mut self, tag: Tag);
}

impl TagSink for Vec<Tag> {
    fn tag(&mut self, tag: Tag) {
        self.push(tag);
    }
}

impl TagSink for Sender<Tag> {
    fn tag(&mut self, tag: Tag) {
        if self.send(tag).is_err() {
            debug!("tag receiver disconnected; dropping tag");
        }
    }
}

impl<S: TagSink + ?Sized> TagSink for &mut S {
    fn tag(&mut self, tag: Tag) {
        (**self).tag(tag);
    }
}
