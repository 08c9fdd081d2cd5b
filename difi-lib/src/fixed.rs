//! VITA-49 fixed-point conversions.

/// Fractional bits of 64-bit frequency/rate fields.
pub const RADIX_64: u32 = 20;
/// Fractional bits of 16-bit level/gain fields.
pub const RADIX_16: u32 = 7;

/// Convert a 64-bit two's-complement value with 20 fractional bits.
#[must_use]
pub fn fixed64_to_f64(raw: u64) -> f64 {
    raw as i64 as f64 / f64::from(1u32 << RADIX_64)
}

/// Convert a 16-bit two's-complement value with 7 fractional bits.
#[must_use]
pub fn fixed16_to_f32(raw: u16) -> f32 {
    f32::from(raw as i16) / f32::from(1u16 << RADIX_16)
}

/// Split a packed gain word into `(rf_gain, if_gain)`: stage 1 in the low half,
/// stage 2 in the high half.
#[must_use]
pub fn split_gain(word: u32) -> (f32, f32) {
    (
        fixed16_to_f32((word & 0xffff) as u16),
        fixed16_to_f32((word >> 16) as u16),
    )
}
