#![doc = include_str!("../README.md")]

mod error;

pub mod armor;
pub mod bits;
pub mod framing;
pub mod message;
pub mod pipeline;
pub mod sentence;

pub use error::{Error, Result};
pub use framing::{read_sentences, LineFramer, RawSentence};
pub use message::{DecodeError, DecodedMessage, FieldTable};
pub use pipeline::{decode_sentences, Pipeline, PipelineStats, Report};
pub use sentence::{validate, Envelope, Header};
