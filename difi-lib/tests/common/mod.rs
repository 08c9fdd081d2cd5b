#![allow(dead_code)]

use std::collections::VecDeque;

use difi::transport::{DatagramTransport, Transport};
use difi::{Config, Engine, Timestamp};
use num_complex::Complex;

pub const STREAM_ID: u32 = 1;
/// Static header bits of a DIFI data packet: type 1 and class id present, TSI/TSF set.
pub const DATA_STATIC_BITS: u16 = 0x18e;

pub fn put_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_be_bytes());
}

pub fn put_u64(buf: &mut [u8], offset: usize, v: u64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_be_bytes());
}

fn header_word(static_bits: u16, pkt_n: u8, len: usize) -> u32 {
    assert_eq!(len % 4, 0, "packet length must be whole words");
    (u32::from(static_bits) << 20) | (u32::from(pkt_n & 0xf) << 16) | (len / 4) as u32
}

/// Builder for data packets.
#[derive(Debug, Clone)]
pub struct DataPacket {
    pub static_bits: u16,
    pub pkt_n: u8,
    pub stream_id: u32,
    pub timestamp: Timestamp,
    pub payload: Vec<u8>,
}

impl DataPacket {
    pub fn new(pkt_n: u8) -> Self {
        DataPacket {
            static_bits: DATA_STATIC_BITS,
            pkt_n,
            stream_id: STREAM_ID,
            timestamp: Timestamp::new(1_700_000_000, 0),
            payload: Vec::new(),
        }
    }

    /// 16 bit big-endian I/Q payload.
    pub fn samples16(mut self, samples: &[(i16, i16)]) -> Self {
        self.payload = samples
            .iter()
            .flat_map(|(i, q)| i.to_be_bytes().into_iter().chain(q.to_be_bytes()))
            .collect();
        self
    }

    /// 8 bit I/Q payload.
    pub fn samples8(mut self, samples: &[(i8, i8)]) -> Self {
        self.payload = samples
            .iter()
            .flat_map(|(i, q)| [*i as u8, *q as u8])
            .collect();
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn stream_id(mut self, stream_id: u32) -> Self {
        self.stream_id = stream_id;
        self
    }

    pub fn static_bits(mut self, bits: u16) -> Self {
        self.static_bits = bits;
        self
    }

    pub fn timestamp(mut self, full: u32, frac: u64) -> Self {
        self.timestamp = Timestamp::new(full, frac);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        // pad to whole words so stream framing sees the whole payload
        let len = (28 + self.payload.len()).div_ceil(4) * 4;
        let mut buf = vec![0u8; len];
        put_u32(&mut buf, 0, header_word(self.static_bits, self.pkt_n, len));
        put_u32(&mut buf, 4, self.stream_id);
        put_u64(&mut buf, 8, 0x007c_386c_0000_0000);
        put_u32(&mut buf, 16, self.timestamp.full);
        put_u64(&mut buf, 20, self.timestamp.frac);
        buf[28..28 + self.payload.len()].copy_from_slice(&self.payload);
        buf
    }
}

fn payload_format(bits: u8) -> u64 {
    u64::from(bits - 1) << 32
}

/// A standard 108 byte context packet declaring `bits` bit samples.
pub fn full_context(stream_id: u32, bits: u8) -> Vec<u8> {
    let mut buf = vec![0u8; 108];
    put_u32(&mut buf, 0, header_word(0x490, 0, 108));
    put_u32(&mut buf, 4, stream_id);
    put_u64(&mut buf, 8, 0x007c_386c_0000_0000);
    put_u32(&mut buf, 16, 1_700_000_001);
    put_u64(&mut buf, 20, 500_000_000_000);
    put_u32(&mut buf, 28, 0xfbb9_8000);
    put_u32(&mut buf, 32, 100);
    put_u64(&mut buf, 36, 20_000_000 << 20);
    put_u64(&mut buf, 44, 0);
    put_u64(&mut buf, 52, 100_000_000 << 20);
    put_u64(&mut buf, 60, (-250_000i64 << 20) as u64);
    put_u32(&mut buf, 68, (-10i16 << 7) as u16 as u32);
    put_u32(&mut buf, 72, (((3i16 << 7) as u16 as u32) << 16) | (20 << 7));
    put_u64(&mut buf, 76, 50_000_000 << 20);
    put_u64(&mut buf, 84, 0);
    put_u32(&mut buf, 92, 0);
    put_u32(&mut buf, 96, 0);
    put_u64(&mut buf, 100, payload_format(bits));
    buf
}

/// A compact 72 byte context packet declaring `bits` bit samples.
pub fn compact_context(stream_id: u32, bits: u8) -> Vec<u8> {
    let mut buf = vec![0u8; 72];
    put_u32(&mut buf, 0, header_word(0x490, 0, 72));
    put_u32(&mut buf, 4, stream_id);
    put_u64(&mut buf, 8, 0x007c_386c_0000_0000);
    put_u32(&mut buf, 16, 0xbb18_8000);
    put_u64(&mut buf, 20, 20_000_000 << 20);
    put_u64(&mut buf, 28, 0);
    put_u64(&mut buf, 36, 2_400_000_000 << 20);
    put_u64(&mut buf, 44, 0);
    put_u64(&mut buf, 52, 25_000_000 << 20);
    put_u32(&mut buf, 60, 0);
    put_u64(&mut buf, 64, payload_format(bits));
    buf
}

/// A 44 byte version flow signal context packet.
pub fn flow_signal(stream_id: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 44];
    put_u32(&mut buf, 0, header_word(0x490, 0, 44));
    put_u32(&mut buf, 4, stream_id);
    buf
}

/// Concatenate packets as they would appear on a stream transport.
pub fn capture(packets: &[Vec<u8>]) -> Vec<u8> {
    packets.concat()
}

pub fn engine(config: Config, packets: &[Vec<u8>]) -> Engine<Complex<i16>> {
    Engine::from_reader(config, std::io::Cursor::new(capture(packets)))
}

/// In-memory datagram transport delivering one queued packet per receive.
pub struct Datagrams(pub VecDeque<Vec<u8>>);

impl DatagramTransport for Datagrams {
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(dgram) = self.0.pop_front() else {
            return Ok(0);
        };
        let n = dgram.len().min(buf.len());
        buf[..n].copy_from_slice(&dgram[..n]);
        Ok(n)
    }
}

pub fn datagram_engine(config: Config, packets: &[Vec<u8>]) -> Engine<Complex<i16>> {
    let transport = Transport::datagram(Datagrams(packets.iter().cloned().collect()));
    Engine::with_transport(config, transport)
}
