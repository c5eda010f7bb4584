//! MSB-first integer extraction from a packed payload.
//!
//! A [BitReader] walks a byte buffer left to right, most-significant bit first, and
//! hands out integer fields of 1 to 32 bits. Fields may straddle byte boundaries. Reads
//! are bounded by the declared bit length of the payload rather than the byte length of
//! the buffer, so the pad bits of a final partial byte are never returned.
use crate::armor::Payload;

/// Widest field that may be read in a single [BitReader::take].
pub const MAX_WIDTH: u32 = 32;

/// How the raw bits of a field are widened to `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Signedness {
    /// Zero-extended.
    Unsigned,
    /// Two's-complement, sign-extended from the top bit of the field.
    Signed,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BitError {
    #[error("requested {requested} bits but only {remaining} remain")]
    Exhausted { requested: u32, remaining: usize },

    #[error("invalid field width {0}; expected 1 to 32 bits")]
    InvalidWidth(u32),
}

fn mask(width: u32) -> u64 {
    (1u64 << width) - 1
}

/// Sign-extend the low `width` bits of `raw`.
///
/// If bit `width - 1` is set the result is `raw - 2^width`, otherwise `raw` unchanged.
/// Bits above `width` are ignored. `width` must be in `1..=32`; 0 yields 0.
#[must_use]
pub fn sign_extend(raw: u64, width: u32) -> i64 {
    if width == 0 {
        return 0;
    }
    debug_assert!(width <= MAX_WIDTH, "width {width} too large");
    let raw = raw & mask(width);
    let value = i64::try_from(raw).unwrap_or_default();
    if (raw >> (width - 1)) & 1 == 1 {
        value - (1i64 << width)
    } else {
        value
    }
}

/// Reads integer fields from packed bits.
///
/// The reader holds its own accumulator and cursor, so independent readers over
/// independent payloads need no coordination.
///
/// # Example
/// ```
/// use ais::bits::BitReader;
///
/// let data = [0b0000_0111, 0b1111_0000];
/// let mut reader = BitReader::from_bytes(&data, 16);
/// assert_eq!(reader.unsigned(6).unwrap(), 1);
/// assert_eq!(reader.signed(4).unwrap(), -1);
/// assert_eq!(reader.remaining(), 6);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_len: usize,
    // index of the next byte to load into the register
    offset: usize,
    // only the low `held` bits are meaningful
    register: u64,
    held: u32,
    consumed: usize,
}

impl<'a> BitReader<'a> {
    /// Reader over a decoded payload, bounded by its bit length.
    #[must_use]
    pub fn new(payload: &'a Payload) -> Self {
        Self::from_bytes(payload.data(), payload.bit_len())
    }

    /// Reader over `data`, bounded to the first `bit_len` bits. A `bit_len` larger than
    /// the buffer is clamped to the buffer.
    #[must_use]
    pub fn from_bytes(data: &'a [u8], bit_len: usize) -> Self {
        BitReader {
            data,
            bit_len: bit_len.min(data.len() * 8),
            offset: 0,
            register: 0,
            held: 0,
            consumed: 0,
        }
    }

    /// Number of bits consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.consumed
    }

    /// Number of bits left before the declared length.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bit_len - self.consumed
    }

    /// Consume the next `nbits` bits and widen them according to `signedness`.
    ///
    /// # Errors
    /// [BitError::InvalidWidth] if `nbits` is not in `1..=32`, and [BitError::Exhausted] if
    /// fewer than `nbits` bits remain. The cursor does not move on error.
    pub fn take(&mut self, nbits: u32, signedness: Signedness) -> Result<i64, BitError> {
        if nbits == 0 || nbits > MAX_WIDTH {
            return Err(BitError::InvalidWidth(nbits));
        }
        let remaining = self.remaining();
        if nbits as usize > remaining {
            return Err(BitError::Exhausted {
                requested: nbits,
                remaining,
            });
        }

        while self.held < nbits {
            let Some(byte) = self.data.get(self.offset) else {
                return Err(BitError::Exhausted {
                    requested: nbits,
                    remaining,
                });
            };
            self.register = (self.register << 8) | u64::from(*byte);
            self.offset += 1;
            self.held += 8;
        }

        let raw = (self.register >> (self.held - nbits)) & mask(nbits);
        self.held -= nbits;
        self.consumed += nbits as usize;

        Ok(match signedness {
            Signedness::Unsigned => i64::try_from(raw).unwrap_or_default(),
            Signedness::Signed => sign_extend(raw, nbits),
        })
    }

    /// Consume a zero-extended field.
    ///
    /// # Errors
    /// See [BitReader::take].
    pub fn unsigned(&mut self, nbits: u32) -> Result<i64, BitError> {
        self.take(nbits, Signedness::Unsigned)
    }

    /// Consume a sign-extended field.
    ///
    /// # Errors
    /// See [BitReader::take].
    pub fn signed(&mut self, nbits: u32) -> Result<i64, BitError> {
        self.take(nbits, Signedness::Signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn reads_across_byte_boundaries() {
        let dat = [0xab, 0xcd, 0xef];
        let mut reader = BitReader::from_bytes(&dat, 24);

        assert_eq!(reader.unsigned(4).unwrap(), 0xa);
        assert_eq!(reader.unsigned(8).unwrap(), 0xbc);
        assert_eq!(reader.unsigned(12).unwrap(), 0xdef);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.position(), 24);
    }

    #[test]
    fn reads_full_32_bit_field() {
        let dat = [0xff, 0xff, 0xff, 0xfe, 0x80];
        let mut reader = BitReader::from_bytes(&dat, 40);

        assert_eq!(reader.unsigned(32).unwrap(), 0xffff_fffe);
        assert_eq!(reader.unsigned(1).unwrap(), 1);

        let mut reader = BitReader::from_bytes(&dat, 40);
        assert_eq!(reader.signed(32).unwrap(), -2);
    }

    #[test_case(0b1000_0000, 8, -128 ; "min 8 bit")]
    #[test_case(0b0111_1111, 8, 127 ; "max 8 bit")]
    #[test_case(0b1111_1111, 8, -1 ; "minus one")]
    #[test_case(0b1, 1, -1 ; "single set bit")]
    #[test_case(0b0, 1, 0 ; "single clear bit")]
    #[test_case(0x800_0000, 28, -134_217_728 ; "min 28 bit")]
    fn sign_extension(raw: u64, width: u32, expected: i64) {
        assert_eq!(sign_extend(raw, width), expected);
    }

    #[test]
    fn sign_extend_ignores_bits_above_width() {
        assert_eq!(sign_extend(0xff01, 8), 1);
    }

    #[test]
    fn exhausted_does_not_advance() {
        let dat = [0xf0];
        let mut reader = BitReader::from_bytes(&dat, 8);
        assert_eq!(reader.unsigned(6).unwrap(), 0b11_1100);

        let err = reader.unsigned(3).unwrap_err();
        assert_eq!(
            err,
            BitError::Exhausted {
                requested: 3,
                remaining: 2
            }
        );
        assert_eq!(reader.position(), 6);
        assert_eq!(reader.unsigned(2).unwrap(), 0);
    }

    #[test]
    fn respects_declared_length_over_buffer_length() {
        // final byte only carries 4 meaningful bits
        let dat = [0xff];
        let mut reader = BitReader::from_bytes(&dat, 4);
        assert_eq!(reader.unsigned(4).unwrap(), 0xf);
        assert!(matches!(
            reader.unsigned(1),
            Err(BitError::Exhausted { remaining: 0, .. })
        ));
    }

    #[test]
    fn bit_len_is_clamped_to_buffer() {
        let dat = [0x01];
        let reader = BitReader::from_bytes(&dat, 100);
        assert_eq!(reader.remaining(), 8);
    }

    #[test_case(0)]
    #[test_case(33)]
    fn rejects_invalid_width(width: u32) {
        let dat = [0u8; 8];
        let mut reader = BitReader::from_bytes(&dat, 64);
        assert_eq!(
            reader.unsigned(width).unwrap_err(),
            BitError::InvalidWidth(width)
        );
        assert_eq!(reader.position(), 0);
    }
}
