//! Six-bit ASCII armoring used to carry AIS binary payloads inside NMEA text.
//!
//! Every armored character carries 6 payload bits. The alphabet is the two contiguous
//! ASCII ranges `0x30..=0x57` (values 0-39) and `0x60..=0x77` (values 40-63). The last
//! character may be padded with 0-5 fill bits that are not part of the payload.
use crate::bits::BitReader;

/// Largest fill-bit count a sentence may declare.
pub const MAX_FILL_BITS: u8 = 5;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArmorError {
    #[error("invalid six-bit character {character:?} at position {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("invalid fill bit count {0}")]
    InvalidFillBits(u8),
}

/// Packed binary payload recovered from armored text.
///
/// `data` holds whole bytes, MSB first; when the bit length is not a multiple of 8 the
/// final byte is left-aligned and its low bits are padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    data: Vec<u8>,
    bit_len: usize,
}

impl Payload {
    /// Wrap already packed bytes. `bit_len` is clamped to the available bits.
    #[must_use]
    pub fn new(data: Vec<u8>, bit_len: usize) -> Self {
        let bit_len = bit_len.min(data.len() * 8);
        Payload { data, bit_len }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of meaningful payload bits.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// A fresh [BitReader] positioned at the first payload bit.
    #[must_use]
    pub fn reader(&self) -> BitReader<'_> {
        BitReader::new(self)
    }
}

/// Six-bit value for an armored character, or `None` if it is outside the alphabet.
#[must_use]
pub fn sixbit_value(c: u8) -> Option<u8> {
    // 0x58..=0x5f would alias 32..=39 after the second offset, so they are not part of
    // the alphabet
    match c {
        0x30..=0x57 => Some(c - 0x30),
        0x60..=0x77 => Some(c - 0x38),
        _ => None,
    }
}

/// Armored character for the low 6 bits of `value`.
#[must_use]
pub fn sixbit_char(value: u8) -> u8 {
    let value = value & 0x3f;
    if value < 40 {
        value + 0x30
    } else {
        value + 0x38
    }
}

/// Decode armored payload text into packed bytes.
///
/// The resulting bit length is exactly `6 * armored.len() - fill_bits`.
///
/// # Errors
/// [ArmorError::InvalidCharacter] for any character outside the six-bit alphabet, and
/// [ArmorError::InvalidFillBits] if `fill_bits` is greater than 5 or greater than the
/// number of armored bits.
///
/// # Example
/// ```
/// let payload = ais::armor::decode(b"w0", 4).unwrap();
/// assert_eq!(payload.data(), &[0xfc, 0x00]);
/// assert_eq!(payload.bit_len(), 8);
/// ```
pub fn decode(armored: &[u8], fill_bits: u8) -> Result<Payload, ArmorError> {
    let total = armored.len() * 6;
    if fill_bits > MAX_FILL_BITS || usize::from(fill_bits) > total {
        return Err(ArmorError::InvalidFillBits(fill_bits));
    }

    let mut data: Vec<u8> = Vec::with_capacity(total.div_ceil(8));
    let mut register: u32 = 0;
    let mut held: u32 = 0;
    for (position, &c) in armored.iter().enumerate() {
        let value = sixbit_value(c).ok_or(ArmorError::InvalidCharacter {
            character: char::from(c),
            position,
        })?;
        register = (register << 6) | u32::from(value);
        held += 6;
        if held >= 8 {
            held -= 8;
            data.push((register >> held) as u8);
        }
    }
    // Left-align whatever is left of the last character
    if held > 0 {
        data.push((register << (8 - held)) as u8);
    }

    Ok(Payload {
        data,
        bit_len: total - usize::from(fill_bits),
    })
}

/// Armor the first `bit_len` bits of `data`.
///
/// Returns the armored text and the number of fill bits appended to pad the final
/// character. `bit_len` is clamped to the bits available in `data`.
#[must_use]
pub fn encode(data: &[u8], bit_len: usize) -> (String, u8) {
    let mut reader = BitReader::from_bytes(data, bit_len);
    let mut armored = String::with_capacity(reader.remaining().div_ceil(6));
    let mut fill_bits = 0;

    while reader.remaining() > 0 {
        let nbits = reader.remaining().min(6) as u32;
        let Ok(value) = reader.unsigned(nbits) else {
            break;
        };
        fill_bits = 6 - nbits;
        armored.push(char::from(sixbit_char((value as u8) << fill_bits)));
    }

    (armored, fill_bits as u8)
}
