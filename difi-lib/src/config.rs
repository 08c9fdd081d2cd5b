//! Receiver configuration.
//!
//! All values are fixed once an [crate::Engine] is constructed.
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::prelude::*;

/// Default DIFI port.
pub const DEFAULT_PORT: u16 = 50000;

/// Socket type used to receive packets.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// One packet per datagram.
    #[default]
    Udp,
    /// Byte stream framed by the packet size in each header word.
    Tcp,
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "tcp" => Ok(Self::Tcp),
            _ => Err(Error::Config(format!("unknown transport {s:?}"))),
        }
    }
}

/// Bits per I or Q component in data packet payloads.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    #[default]
    Sixteen,
}

impl BitDepth {
    #[must_use]
    pub fn bits(self) -> u8 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    /// Number of payload bytes used by one complex (I/Q) sample.
    #[must_use]
    pub fn sample_len(self) -> usize {
        usize::from(self.bits() / 8) * 2
    }
}

impl TryFrom<u8> for BitDepth {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            _ => Err(Error::Config(format!(
                "bit depth must be 8 or 16; got {value}"
            ))),
        }
    }
}

impl From<BitDepth> for u8 {
    fn from(value: BitDepth) -> Self {
        value.bits()
    }
}

impl FromStr for BitDepth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bits = s
            .parse::<u8>()
            .map_err(|_| Error::Config(format!("invalid bit depth {s:?}")))?;
        BitDepth::try_from(bits)
    }
}

impl Display for BitDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// What to do when a context packet does not agree with the configured bit depth,
/// or does not have a supported length.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ContextPolicy {
    /// Skip validation; always forward decoded context.
    Ignore,
    /// Warn and pause sample output, but still forward the context.
    WarnForward,
    /// Warn, pause sample output and discard the context.
    #[default]
    WarnDrop,
    /// Stop the stream with a fatal error.
    Abort,
}

impl FromStr for ContextPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "warn-forward" => Ok(Self::WarnForward),
            "warn-drop" => Ok(Self::WarnDrop),
            "abort" => Ok(Self::Abort),
            _ => Err(Error::Config(format!(
                "unknown context policy {s:?}; expected ignore, warn-forward, warn-drop or abort"
            ))),
        }
    }
}

impl Display for ContextPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContextPolicy::Ignore => "ignore",
            ContextPolicy::WarnForward => "warn-forward",
            ContextPolicy::WarnDrop => "warn-drop",
            ContextPolicy::Abort => "abort",
        };
        write!(f, "{s}")
    }
}

/// Engine configuration.
///
/// # Example
/// ```
/// use difi::{BitDepth, Config, ContextPolicy, TransportKind};
///
/// let config = Config::builder()
///     .address("127.0.0.1")
///     .port(4991)
///     .transport(TransportKind::Tcp)
///     .stream_id(7)
///     .bit_depth(BitDepth::Eight)
///     .context_policy(ContextPolicy::Abort)
///     .build();
/// assert_eq!(config.stream_id, Some(7));
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, TypedBuilder)]
pub struct Config {
    /// Local address to bind; an IPv4 multicast address joins that group.
    #[builder(default = String::from("0.0.0.0"), setter(into))]
    pub address: String,
    #[builder(default = DEFAULT_PORT)]
    pub port: u16,
    #[builder(default)]
    pub transport: TransportKind,
    /// Only accept packets with this stream id.
    #[builder(default, setter(strip_option))]
    pub stream_id: Option<u32>,
    #[builder(default)]
    pub bit_depth: BitDepth,
    #[builder(default)]
    pub context_policy: ContextPolicy,
    /// Longest a single transport read may block before reporting idle.
    #[builder(default = Duration::from_millis(100))]
    pub read_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}
