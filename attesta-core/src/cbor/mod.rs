//! CBOR (RFC 7049) codec restricted to definite-length items.
//!
//! The decoder is the entry point for every untrusted byte string the
//! library touches: attestation objects, attestation statements and COSE
//! keys embedded in authenticator data. The encoder emits canonical CBOR
//! (shortest length prefixes, map keys sorted by length then bytes).

mod decoder;
mod encoder;
mod value;

use thiserror::Error;

use crate::bytes::ByteBufferError;

pub use decoder::{
    decode, decode_in_place, decode_in_place_with, decode_with, DecodeOptions, DuplicateKeys,
};
pub use encoder::{
    encode_array, encode_bool, encode_byte_string, encode_float, encode_integer, encode_map,
    encode_map_values, encode_null, encode_text_string, encode_unsigned, encode_value,
};
pub use value::{CborMap, CborValue, MapKey};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CborError {
    #[error("Error with byte buffer during parsing: {0}")]
    Buffer(#[from] ByteBufferError),

    #[error("Reserved value used")]
    ReservedValue,

    #[error("Indefinite length is not supported")]
    IndefiniteLength,

    #[error("Unsupported simple value {0}")]
    UnsupportedSimpleValue(u8),

    #[error("Can only use strings or integers as map keys (found {0})")]
    InvalidMapKey(&'static str),

    #[error("Duplicate map key {0}")]
    DuplicateMapKey(String),

    #[error("Unused bytes after data item ({0} trailing bytes)")]
    UnusedBytes(usize),

    #[error("Invalid UTF-8 in text string: {0}")]
    InvalidUtf8(String),

    #[error("Negative integer -1-{0} is outside the supported range")]
    IntegerOutOfRange(u64),

    #[error("Length {0} does not fit in memory")]
    LengthOverflow(u64),

    #[error("Nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}

impl CborError {
    /// True when the input is well-formed CBOR using a feature this codec rejects.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::ReservedValue | Self::IndefiniteLength | Self::UnsupportedSimpleValue(_)
        )
    }
}
