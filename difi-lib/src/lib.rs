#![doc = include_str!("../README.md")]

mod error;

pub mod config;
pub mod context;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod framing;
pub mod packet;
pub mod sequence;
pub mod transport;
pub mod unpack;

pub use config::{BitDepth, Config, ContextPolicy, TransportKind};
pub use context::{CompactContext, ContextRecord, ContextSnapshot, FullContext};
pub use engine::{Engine, Pull, Stats};
pub use error::{Error, Result};
pub use event::{MetadataEvent, SequenceAnomaly, Tag, TagSink};
pub use packet::{PacketHeader, PacketType, Timestamp};
pub use unpack::IqSample;

mod prelude {
    pub(crate) use crate::error::{Error, Result};
}
