//! I/Q sample extraction from data packet payloads.
use num_complex::Complex;
use tracing::warn;

use crate::config::BitDepth;

/// Output sample types an [Unpacker] can produce.
pub trait IqSample: Copy + Default + Send + 'static {
    fn from_iq(i: i16, q: i16) -> Self;
}

impl IqSample for Complex<i16> {
    fn from_iq(i: i16, q: i16) -> Self {
        Complex::new(i, q)
    }
}

impl IqSample for Complex<f32> {
    fn from_iq(i: i16, q: i16) -> Self {
        Complex::new(f32::from(i), f32::from(q))
    }
}

impl IqSample for Complex<f64> {
    fn from_iq(i: i16, q: i16) -> Self {
        Complex::new(f64::from(i), f64::from(q))
    }
}

fn unpack_8<T: IqSample>(payload: &[u8], out: &mut [T]) -> usize {
    let mut count = 0;
    for (dst, iq) in out.iter_mut().zip(payload.chunks_exact(2)) {
        *dst = T::from_iq(i16::from(iq[0] as i8), i16::from(iq[1] as i8));
        count += 1;
    }
    count
}

fn unpack_16<T: IqSample>(payload: &[u8], out: &mut [T]) -> usize {
    let mut count = 0;
    for (dst, iq) in out.iter_mut().zip(payload.chunks_exact(4)) {
        *dst = T::from_iq(
            i16::from_be_bytes([iq[0], iq[1]]),
            i16::from_be_bytes([iq[2], iq[3]]),
        );
        count += 1;
    }
    count
}

/// Extracts interleaved I/Q samples at a fixed bit depth.
///
/// The extraction routine is selected once, when the unpacker is created.
pub struct Unpacker<T: IqSample> {
    bit_depth: BitDepth,
    unpack: fn(&[u8], &mut [T]) -> usize,
}

impl<T: IqSample> Unpacker<T> {
    #[must_use]
    pub fn new(bit_depth: BitDepth) -> Self {
        let unpack: fn(&[u8], &mut [T]) -> usize = match bit_depth {
            BitDepth::Eight => unpack_8::<T>,
            BitDepth::Sixteen => unpack_16::<T>,
        };
        Unpacker { bit_depth, unpack }
    }

    #[must_use]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Number of complete samples contained in `payload_len` bytes.
    #[must_use]
    pub fn samples_in(&self, payload_len: usize) -> usize {
        payload_len / self.bit_depth.sample_len()
    }

    /// Unpack as many samples from `payload` as fit in `out`, returning the number written.
    /// Trailing bytes that do not form a whole sample are ignored.
    pub fn unpack(&self, payload: &[u8], out: &mut [T]) -> usize {
        if payload.len() % self.bit_depth.sample_len() != 0 {
            warn!(
                payload_len = payload.len(),
                bit_depth = %self.bit_depth,
                "payload is not divisible by the sample size, samples will be lost; check the bit depth configuration"
            );
        }
        (self.unpack)(payload, out)
    }
}

impl<T: IqSample> std::fmt::Debug for Unpacker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unpacker{{bit_depth={}}}", self.bit_depth)
    }
}
