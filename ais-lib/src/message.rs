//! AIS binary message decoding.
//!
//! Every AIS message starts with a 6-bit message type. The remaining fields are fixed
//! width integers whose layout depends on the type. Layouts are declared as static
//! [MessageLayout] tables and looked up in a [FieldTable], so adding a message type means
//! adding a table rather than decoding code.
use crate::armor::Payload;
use crate::bits::{Signedness, MAX_WIDTH};

/// Width of the message type discriminant.
pub const TYPE_WIDTH: u32 = 6;

/// Number of possible message type codes.
pub const TYPE_COUNT: usize = 1 << TYPE_WIDTH;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// Fewer than 6 bits, so there is no message type.
    #[error("payload too short for a message type")]
    Empty,

    /// The payload ended before every field of the layout was read.
    #[error("message type {0} truncated")]
    Truncated(u8),

    #[error("unsupported message type {0}")]
    UnsupportedType(u8),
}

impl DecodeError {
    /// True if the payload was well formed but there is no layout for its type.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedType(_))
    }

    /// Message type code, if one could be read.
    #[must_use]
    pub fn message_type(&self) -> Option<u8> {
        match self {
            Self::Empty => None,
            Self::Truncated(code) | Self::UnsupportedType(code) => Some(*code),
        }
    }
}

/// One fixed width field of a message layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Bits, 1 to 32.
    pub width: u32,
    pub signedness: Signedness,
}

impl FieldSpec {
    #[must_use]
    pub const fn unsigned(name: &'static str, width: u32) -> Self {
        FieldSpec {
            name,
            width,
            signedness: Signedness::Unsigned,
        }
    }

    #[must_use]
    pub const fn signed(name: &'static str, width: u32) -> Self {
        FieldSpec {
            name,
            width,
            signedness: Signedness::Signed,
        }
    }
}

/// Ordered field list for a message type, excluding the type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLayout {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl MessageLayout {
    /// Total bits required by this layout, including the type discriminant.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        TYPE_WIDTH as usize + self.fields.iter().map(|f| f.width as usize).sum::<usize>()
    }
}

/// Scheduled, assigned and special position reports (types 1, 2 and 3).
pub static POSITION_REPORT_CLASS_A: MessageLayout = MessageLayout {
    name: "position report class A",
    fields: &[
        FieldSpec::unsigned("repeat_indicator", 2),
        FieldSpec::unsigned("mmsi", 30),
        FieldSpec::unsigned("nav_status", 4),
        FieldSpec::signed("rate_of_turn", 8),
        FieldSpec::unsigned("speed_over_ground", 10),
        FieldSpec::unsigned("position_accuracy", 1),
        FieldSpec::signed("longitude", 28),
        FieldSpec::signed("latitude", 27),
        FieldSpec::unsigned("course_over_ground", 12),
        FieldSpec::unsigned("true_heading", 9),
        FieldSpec::unsigned("timestamp", 6),
        FieldSpec::unsigned("maneuver_indicator", 2),
        FieldSpec::unsigned("spare", 3),
        FieldSpec::unsigned("raim_flag", 1),
        FieldSpec::unsigned("radio_status", 19),
    ],
};

/// Base station report (type 4).
pub static BASE_STATION_REPORT: MessageLayout = MessageLayout {
    name: "base station report",
    fields: &[
        FieldSpec::unsigned("repeat_indicator", 2),
        FieldSpec::unsigned("mmsi", 30),
        FieldSpec::unsigned("year", 14),
        FieldSpec::unsigned("month", 4),
        FieldSpec::unsigned("day", 5),
        FieldSpec::unsigned("hour", 5),
        FieldSpec::unsigned("minute", 6),
        FieldSpec::unsigned("second", 6),
        FieldSpec::unsigned("position_accuracy", 1),
        FieldSpec::signed("longitude", 28),
        FieldSpec::signed("latitude", 27),
        FieldSpec::unsigned("epfd_type", 4),
        FieldSpec::unsigned("spare", 10),
        FieldSpec::unsigned("raim_flag", 1),
        FieldSpec::unsigned("radio_status", 19),
    ],
};

/// Standard class B CS position report (type 18).
pub static POSITION_REPORT_CLASS_B: MessageLayout = MessageLayout {
    name: "position report class B",
    fields: &[
        FieldSpec::unsigned("repeat_indicator", 2),
        FieldSpec::unsigned("mmsi", 30),
        FieldSpec::unsigned("reserved", 8),
        FieldSpec::unsigned("speed_over_ground", 10),
        FieldSpec::unsigned("position_accuracy", 1),
        FieldSpec::signed("longitude", 28),
        FieldSpec::signed("latitude", 27),
        FieldSpec::unsigned("course_over_ground", 12),
        FieldSpec::unsigned("true_heading", 9),
        FieldSpec::unsigned("timestamp", 6),
        FieldSpec::unsigned("regional_reserved", 2),
        FieldSpec::unsigned("cs_unit", 1),
        FieldSpec::unsigned("display_flag", 1),
        FieldSpec::unsigned("dsc_flag", 1),
        FieldSpec::unsigned("band_flag", 1),
        FieldSpec::unsigned("message_22_flag", 1),
        FieldSpec::unsigned("assigned_mode", 1),
        FieldSpec::unsigned("raim_flag", 1),
        FieldSpec::unsigned("radio_status", 20),
    ],
};

/// A decoded field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Field {
    pub name: &'static str,
    pub width: u32,
    pub signedness: Signedness,
    pub value: i64,
}

/// A decoded message. Fields are in layout order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodedMessage {
    pub message_type: u8,
    pub name: &'static str,
    pub fields: Vec<Field>,
}

impl DecodedMessage {
    /// Value of the first field called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<i64> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }
}

impl<'a> IntoIterator for &'a DecodedMessage {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Maps message type codes to layouts.
///
/// # Example
/// ```
/// use ais::message::{FieldSpec, FieldTable, MessageLayout};
///
/// static STATIC_DATA: MessageLayout = MessageLayout {
///     name: "static data report",
///     fields: &[
///         FieldSpec::unsigned("repeat_indicator", 2),
///         FieldSpec::unsigned("mmsi", 30),
///         FieldSpec::unsigned("part_number", 2),
///     ],
/// };
///
/// let table = FieldTable::standard().register(&[24], &STATIC_DATA);
/// assert!(table.layout(24).is_some());
/// assert!(table.layout(1).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct FieldTable {
    layouts: [Option<&'static MessageLayout>; TYPE_COUNT],
}

impl FieldTable {
    /// A table with no layouts.
    #[must_use]
    pub fn empty() -> Self {
        FieldTable {
            layouts: [None; TYPE_COUNT],
        }
    }

    /// Table with types 1, 2, 3, 4 and 18.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .register(&[1, 2, 3], &POSITION_REPORT_CLASS_A)
            .register(&[4], &BASE_STATION_REPORT)
            .register(&[18], &POSITION_REPORT_CLASS_B)
    }

    /// Use `layout` for each of `codes`, replacing any existing layout. Codes that cannot
    /// fit in the 6-bit discriminant are ignored, as is a layout with a field width
    /// outside 1 to 32 bits.
    #[must_use]
    pub fn register(mut self, codes: &[u8], layout: &'static MessageLayout) -> Self {
        if let Some(field) = layout
            .fields
            .iter()
            .find(|f| !(1..=MAX_WIDTH).contains(&f.width))
        {
            tracing::warn!(
                layout = layout.name,
                field = field.name,
                width = field.width,
                "ignoring layout with invalid field width"
            );
            return self;
        }
        for &code in codes {
            match self.layouts.get_mut(usize::from(code)) {
                Some(slot) => *slot = Some(layout),
                None => tracing::warn!(code, layout = layout.name, "ignoring invalid message type"),
            }
        }
        self
    }

    #[must_use]
    pub fn layout(&self, code: u8) -> Option<&'static MessageLayout> {
        self.layouts.get(usize::from(code)).copied().flatten()
    }

    /// Message type codes with a registered layout, ascending.
    pub fn codes(&self) -> impl Iterator<Item = u8> + '_ {
        self.layouts
            .iter()
            .enumerate()
            .filter_map(|(code, layout)| layout.map(|_| code as u8))
    }

    /// Decode `payload` using the registered layouts.
    ///
    /// # Errors
    /// [DecodeError::Empty] if there are fewer than 6 bits, [DecodeError::UnsupportedType]
    /// if the type has no layout, and [DecodeError::Truncated] if the payload runs out
    /// before the last field.
    pub fn decode(&self, payload: &Payload) -> Result<DecodedMessage, DecodeError> {
        let mut reader = payload.reader();
        let code = reader
            .unsigned(TYPE_WIDTH)
            .map_err(|_| DecodeError::Empty)? as u8;
        let layout = self.layout(code).ok_or(DecodeError::UnsupportedType(code))?;

        let fields = layout
            .fields
            .iter()
            .map(|spec| {
                reader
                    .take(spec.width, spec.signedness)
                    .map(|value| Field {
                        name: spec.name,
                        width: spec.width,
                        signedness: spec.signedness,
                        value,
                    })
                    // widths are checked by register, so only exhaustion is possible
                    .map_err(|_| DecodeError::Truncated(code))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DecodedMessage {
            message_type: code,
            name: layout.name,
            fields,
        })
    }
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Decode `payload` with [FieldTable::standard].
///
/// # Errors
/// See [FieldTable::decode].
pub fn decode(payload: &Payload) -> Result<DecodedMessage, DecodeError> {
    FieldTable::standard().decode(payload)
}
