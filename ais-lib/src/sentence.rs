//! NMEA-0183 AIS sentence validation.
//!
//! An AIS sentence looks like
//! ```text
//! !AIVDM,1,1,,B,15NPOOPP00o?b=bD5N5oOj2D0000,0*64
//! ```
//! that is, a `!` (or `$`) delimiter, a 2 character talker id, the sentence id `VDM` or
//! `VDO`, six comma separated fields and a `*` followed by the two hex digit XOR of every
//! byte between the delimiter and the `*`.
//!
//! The six fields are: fragment count, fragment index, sequential message id, radio
//! channel, armored payload, fill-bit count.
use std::fmt::Display;

use crate::armor::{self, ArmorError, Payload, MAX_FILL_BITS};
use crate::framing::RawSentence;

/// Number of comma separated fields following the address field.
pub const FIELD_COUNT: usize = 6;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SentenceError {
    #[error("sentence does not start with '!' or '$'")]
    MalformedPrefix,

    #[error("missing '*' checksum delimiter")]
    MissingChecksumDelimiter,

    #[error("invalid checksum digits {0:?}")]
    InvalidChecksumDigits(String),

    #[error("checksum mismatch: sentence has {expected:02X}, computed {computed:02X}")]
    ChecksumMismatch { expected: u8, computed: u8 },

    #[error("unsupported sentence type {0:?}")]
    UnsupportedSentenceType(String),

    #[error("expected {expected} fields, got {actual}")]
    FieldCountMismatch { expected: usize, actual: usize },

    #[error("invalid {field} value {value:?}")]
    InvalidField { field: &'static str, value: String },
}

impl SentenceError {
    /// True for errors that just mean "not an AIS sentence", which a consumer may drop
    /// without reporting.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::UnsupportedSentenceType(_))
    }
}

/// AIS talker ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Talker {
    /// `AB` NMEA 4.0 base station
    BaseStation,
    /// `AD` NMEA 4.0 dependent base station
    DependentBaseStation,
    /// `AI` mobile station
    Mobile,
    /// `AN` NMEA 4.0 aid to navigation
    AidToNavigation,
    /// `AR` NMEA 4.0 receiving station
    ReceivingStation,
    /// `AS` NMEA 4.0 limited base station
    LimitedBaseStation,
    /// `AT` NMEA 4.0 transmitting station
    TransmittingStation,
    /// `AX` NMEA 4.0 repeater station
    Repeater,
    /// `BS` base station, deprecated
    LegacyBaseStation,
    /// `SA` physical shore station
    ShoreStation,
}

impl Talker {
    #[must_use]
    pub fn from_code(code: &[u8]) -> Option<Self> {
        Some(match code {
            b"AB" => Self::BaseStation,
            b"AD" => Self::DependentBaseStation,
            b"AI" => Self::Mobile,
            b"AN" => Self::AidToNavigation,
            b"AR" => Self::ReceivingStation,
            b"AS" => Self::LimitedBaseStation,
            b"AT" => Self::TransmittingStation,
            b"AX" => Self::Repeater,
            b"BS" => Self::LegacyBaseStation,
            b"SA" => Self::ShoreStation,
            _ => return None,
        })
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BaseStation => "AB",
            Self::DependentBaseStation => "AD",
            Self::Mobile => "AI",
            Self::AidToNavigation => "AN",
            Self::ReceivingStation => "AR",
            Self::LimitedBaseStation => "AS",
            Self::TransmittingStation => "AT",
            Self::Repeater => "AX",
            Self::LegacyBaseStation => "BS",
            Self::ShoreStation => "SA",
        }
    }
}

impl Display for Talker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Sentence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SentenceKind {
    /// Data received from other stations.
    Vdm,
    /// Own-vessel data.
    Vdo,
}

impl SentenceKind {
    #[must_use]
    pub fn from_code(code: &[u8]) -> Option<Self> {
        match code {
            b"VDM" => Some(Self::Vdm),
            b"VDO" => Some(Self::Vdo),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Vdm => "VDM",
            Self::Vdo => "VDO",
        }
    }
}

/// AIS radio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Channel {
    A,
    B,
}

impl Channel {
    /// Any field value containing `B` or `2` is channel B; everything else, including an
    /// empty field, is channel A.
    #[must_use]
    pub fn from_field(value: &[u8]) -> Self {
        if value.iter().any(|&b| b == b'B' || b == b'2') {
            Self::B
        } else {
            Self::A
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// Validated sentence metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Header {
    pub talker: Talker,
    pub kind: SentenceKind,
    /// Total fragments in the logical message, at least 1.
    pub fragment_count: u8,
    /// 1-based index of this fragment, at most `fragment_count`.
    pub fragment_index: u8,
    /// Sequential message id linking fragments, if present.
    pub sequence_id: Option<u8>,
    pub channel: Channel,
    /// Pad bits in the final armored character, 0 to 5.
    pub fill_bits: u8,
}

impl Header {
    /// True if this sentence is one part of a multi-sentence message.
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        self.fragment_count > 1
    }
}

/// A validated sentence. The payload borrows from the [RawSentence] it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub header: Header,
    /// Six-bit armored payload text.
    pub payload: &'a [u8],
}

impl Envelope<'_> {
    /// Unarmor the payload.
    ///
    /// # Errors
    /// See [armor::decode].
    pub fn decode_payload(&self) -> Result<Payload, ArmorError> {
        armor::decode(self.payload, self.header.fill_bits)
    }
}

/// XOR of every byte in `body`.
#[must_use]
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

fn lossy(dat: &[u8]) -> String {
    String::from_utf8_lossy(dat).into_owned()
}

fn parse_checksum(digits: &[u8]) -> Option<u8> {
    match digits {
        [hi, lo] if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
            let digits = std::str::from_utf8(digits).ok()?;
            u8::from_str_radix(digits, 16).ok()
        }
        _ => None,
    }
}

fn parse_number(field: &'static str, value: &[u8]) -> Result<u8, SentenceError> {
    let invalid = || SentenceError::InvalidField {
        field,
        value: lossy(value),
    };
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(invalid)
}

fn parse_address(address: &[u8]) -> Option<(Talker, SentenceKind)> {
    if address.len() != 5 {
        return None;
    }
    let (talker, kind) = address.split_at(2);
    Some((Talker::from_code(talker)?, SentenceKind::from_code(kind)?))
}

/// Validate a raw sentence and split it into an [Envelope].
///
/// Checks are made in wire order: delimiter, checksum, address, field count, field
/// values.
///
/// # Errors
/// The first [SentenceError] encountered.
///
/// # Example
/// ```
/// use ais::sentence::{validate, Channel};
/// use ais::RawSentence;
///
/// let raw = RawSentence::from("!AIVDM,1,1,,B,15NPOOPP00o?b=bD5N5oOj2D0000,0*64");
/// let envelope = validate(&raw).unwrap();
/// assert_eq!(envelope.header.channel, Channel::B);
/// assert_eq!(envelope.payload, b"15NPOOPP00o?b=bD5N5oOj2D0000");
/// ```
pub fn validate(sentence: &RawSentence) -> Result<Envelope<'_>, SentenceError> {
    let data = sentence.as_bytes();
    let rest = match data.split_first() {
        Some((b'!' | b'$', rest)) => rest,
        _ => return Err(SentenceError::MalformedPrefix),
    };

    let star = rest
        .iter()
        .position(|&b| b == b'*')
        .ok_or(SentenceError::MissingChecksumDelimiter)?;
    let (body, tail) = rest.split_at(star);
    let digits = tail[1..].trim_ascii_end();
    let expected = parse_checksum(digits)
        .ok_or_else(|| SentenceError::InvalidChecksumDigits(lossy(digits)))?;
    let computed = checksum(body);
    if expected != computed {
        return Err(SentenceError::ChecksumMismatch { expected, computed });
    }

    let mut fields = body.split(|&b| b == b',');
    let address = fields.next().unwrap_or_default();
    let (talker, kind) = parse_address(address)
        .ok_or_else(|| SentenceError::UnsupportedSentenceType(lossy(address)))?;

    let fields: Vec<&[u8]> = fields.collect();
    let [count, index, sequence, channel, payload, fill] = fields[..] else {
        return Err(SentenceError::FieldCountMismatch {
            expected: FIELD_COUNT,
            actual: fields.len(),
        });
    };

    let fragment_count = parse_number("fragment count", count)?;
    if fragment_count == 0 {
        return Err(SentenceError::InvalidField {
            field: "fragment count",
            value: lossy(count),
        });
    }
    let fragment_index = parse_number("fragment index", index)?;
    if fragment_index == 0 || fragment_index > fragment_count {
        return Err(SentenceError::InvalidField {
            field: "fragment index",
            value: lossy(index),
        });
    }
    let sequence_id = if sequence.is_empty() {
        None
    } else {
        Some(parse_number("sequence id", sequence)?)
    };
    let fill_bits = parse_number("fill bits", fill)?;
    if fill_bits > MAX_FILL_BITS {
        return Err(SentenceError::InvalidField {
            field: "fill bits",
            value: lossy(fill),
        });
    }

    Ok(Envelope {
        header: Header {
            talker,
            kind,
            fragment_count,
            fragment_index,
            sequence_id,
            channel: Channel::from_field(channel),
            fill_bits,
        },
        payload,
    })
}

/// Format a complete sentence, including delimiter and checksum, for `header` and the
/// armored `payload`.
///
/// # Example
/// ```
/// use ais::sentence::{format_sentence, validate};
/// use ais::RawSentence;
///
/// let raw = RawSentence::from("!AIVDO,1,1,,B,15NPOOPP00o?b=bD5N5oOj2D0000,0*66");
/// let envelope = validate(&raw).unwrap();
/// assert_eq!(
///     format_sentence(&envelope.header, "15NPOOPP00o?b=bD5N5oOj2D0000"),
///     raw.to_string()
/// );
/// ```
#[must_use]
pub fn format_sentence(header: &Header, payload: &str) -> String {
    let body = format!(
        "{}{},{},{},{},{},{},{}",
        header.talker.code(),
        header.kind.code(),
        header.fragment_count,
        header.fragment_index,
        header.sequence_id.map(|id| id.to_string()).unwrap_or_default(),
        header.channel.code(),
        payload,
        header.fill_bits,
    );
    format!("!{body}*{:02X}", checksum(body.as_bytes()))
}
