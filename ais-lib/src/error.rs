use crate::{
    armor::ArmorError, bits::BitError, framing::FramingError, message::DecodeError,
    sentence::SentenceError,
};

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unterminated data exceeded the line buffer.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// Sentence failed prefix, checksum, or field validation.
    #[error(transparent)]
    Sentence(#[from] SentenceError),

    #[error(transparent)]
    Armor(#[from] ArmorError),

    #[error(transparent)]
    Bits(#[from] BitError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

pub type Result<T> = std::result::Result<T, Error>;
