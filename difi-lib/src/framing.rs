//! Packet framing: at most one complete packet per call.
//!
//! Stream transports carry packets back to back, so the packet length comes from the
//! size field of the header word. Datagram transports carry exactly one packet per
//! datagram. No header validation is done here.
use tracing::{trace, warn};

use crate::packet::{be_u32, size_words};
use crate::prelude::*;
use crate::transport::{DatagramTransport, StreamTransport, Transport};

/// Length of the header word read first in stream mode.
const HEADER_WORD_LEN: usize = 4;

/// Largest possible packet: the size field is 16 bits counting 32-bit words.
pub const MAX_PACKET_LEN: usize = 0xffff * 4;

/// The result of framing one packet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Framed {
    /// Bytes placed at the start of the buffer; 0 if nothing was available.
    pub len: usize,
    /// Length declared by the header word. Only known for stream transports.
    pub declared: Option<usize>,
}

impl Framed {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if fewer bytes were read than the header declared.
    #[must_use]
    pub fn is_short(&self) -> bool {
        matches!(self.declared, Some(declared) if self.len < declared)
    }
}

/// Read one packet from a stream transport into `buf`.
///
/// `buf` should hold at least [MAX_PACKET_LEN] bytes; longer declared lengths are
/// truncated to the buffer.
///
/// # Errors
/// Any I/O error from the transport.
pub fn frame_stream<S>(transport: &mut S, buf: &mut [u8]) -> Result<Framed>
where
    S: StreamTransport + ?Sized,
{
    if !transport.is_peer_connected() {
        return Ok(Framed::default());
    }
    let got = transport.read(&mut buf[..HEADER_WORD_LEN])?;
    if got < HEADER_WORD_LEN {
        if got > 0 {
            warn!(got, "short header word read; discarding");
        }
        return Ok(Framed::default());
    }

    let declared = usize::from(size_words(be_u32(buf))) * 4;
    let end = declared.min(buf.len());
    let mut len = HEADER_WORD_LEN;
    if end > HEADER_WORD_LEN {
        len += transport.read(&mut buf[HEADER_WORD_LEN..end])?;
    }
    trace!(len, declared, "framed stream packet");

    Ok(Framed {
        len,
        declared: Some(declared),
    })
}

/// Receive one packet from a datagram transport into `buf`.
///
/// # Errors
/// Any I/O error from the transport.
pub fn frame_datagram<D>(transport: &mut D, buf: &mut [u8]) -> Result<Framed>
where
    D: DatagramTransport + ?Sized,
{
    let len = transport.recv(buf)?;
    if len > 0 {
        trace!(len, "framed datagram packet");
    }
    Ok(Framed {
        len,
        declared: None,
    })
}

/// Frame one packet from whichever kind of transport this is.
///
/// # Errors
/// Any I/O error from the transport.
pub fn frame(transport: &mut Transport, buf: &mut [u8]) -> Result<Framed> {
    match transport {
        Transport::Stream(t) => frame_stream(t.as_mut(), buf),
        Transport::Datagram(t) => frame_datagram(t.as_mut(), buf),
    }
}
