//! Immutable byte buffer with bounds-checked big-endian accessors.
//!
//! Every read is checked against the buffer length, so decoding untrusted
//! authenticator data can fail but never read out of range.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ByteBufferError {
    #[error("cannot read {len} bytes at offset {offset} (buffer length {size})")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid base64url: {0}")]
    InvalidBase64(String),
}

/// Cheaply clonable, immutable byte sequence.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ByteBuffer {
    data: Arc<[u8]>,
}

impl ByteBuffer {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            data: Arc::from(data),
        }
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, ByteBufferError> {
        hex::decode(hex_str)
            .map(Self::new)
            .map_err(|e| ByteBufferError::InvalidHex(e.to_string()))
    }

    /// Decode base64url, with or without trailing padding.
    pub fn from_base64url(encoded: &str) -> Result<Self, ByteBufferError> {
        let trimmed = encoded.trim();
        let result = if trimmed.ends_with('=') {
            URL_SAFE.decode(trimmed)
        } else {
            URL_SAFE_NO_PAD.decode(trimmed)
        };
        result
            .map(Self::new)
            .map_err(|e| ByteBufferError::InvalidBase64(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }

    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&[u8], ByteBufferError> {
        offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .map(|end| &self.data[offset..end])
            .ok_or(ByteBufferError::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            })
    }

    /// Copy `len` bytes starting at `offset` into a new buffer.
    pub fn sub_buffer(&self, offset: usize, len: usize) -> Result<ByteBuffer, ByteBufferError> {
        self.bytes_at(offset, len).map(ByteBuffer::new)
    }

    fn array_at<const N: usize>(&self, offset: usize) -> Result<[u8; N], ByteBufferError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes_at(offset, N)?);
        Ok(out)
    }

    pub fn byte_at(&self, offset: usize) -> Result<u8, ByteBufferError> {
        self.array_at::<1>(offset).map(|b| b[0])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16, ByteBufferError> {
        self.array_at(offset).map(u16::from_be_bytes)
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, ByteBufferError> {
        self.array_at(offset).map(u32::from_be_bytes)
    }

    pub fn u64_at(&self, offset: usize) -> Result<u64, ByteBufferError> {
        self.array_at(offset).map(u64::from_be_bytes)
    }

    /// IEEE 754 half-precision float, widened to f64.
    pub fn half_float_at(&self, offset: usize) -> Result<f64, ByteBufferError> {
        self.u16_at(offset).map(decode_half)
    }

    pub fn float_at(&self, offset: usize) -> Result<f64, ByteBufferError> {
        self.array_at(offset)
            .map(|b| f64::from(f32::from_be_bytes(b)))
    }

    pub fn double_at(&self, offset: usize) -> Result<f64, ByteBufferError> {
        self.array_at(offset).map(f64::from_be_bytes)
    }

    /// Constant-time comparison against another byte string.
    pub fn equals_constant_time(&self, other: &[u8]) -> bool {
        self.data.len() == other.len() && openssl::memcmp::eq(&self.data, other)
    }
}

fn decode_half(half: u16) -> f64 {
    let exponent = (half >> 10) & 0x1f;
    let mantissa = f64::from(half & 0x3ff);
    let value = match exponent {
        0 => mantissa * 2f64.powi(-24),
        31 if mantissa == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (mantissa + 1024.0) * 2f64.powi(i32::from(exponent) - 25),
    };
    if half & 0x8000 != 0 {
        -value
    } else {
        value
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteBuffer({})", self.to_hex())
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl<const N: usize> From<[u8; N]> for ByteBuffer {
    fn from(data: [u8; N]) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_accessors() {
        let buf = ByteBuffer::from_hex("0102030405060708090a").unwrap();
        assert_eq!(buf.byte_at(0).unwrap(), 0x01);
        assert_eq!(buf.u16_at(1).unwrap(), 0x0203);
        assert_eq!(buf.u32_at(2).unwrap(), 0x0304_0506);
        assert_eq!(buf.u64_at(2).unwrap(), 0x0304_0506_0708_090a);
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let buf = ByteBuffer::from_hex("0102").unwrap();
        assert!(buf.u32_at(0).is_err());
        assert!(buf.byte_at(2).is_err());
        assert!(buf.bytes_at(1, 2).is_err());
        assert!(buf.bytes_at(usize::MAX, 2).is_err());
        assert_eq!(buf.bytes_at(2, 0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_half_floats() {
        let cases: &[(&str, f64)] = &[
            ("0000", 0.0),
            ("3c00", 1.0),
            ("3e00", 1.5),
            ("7bff", 65504.0),
            ("0001", 5.960464477539063e-8),
            ("0400", 0.00006103515625),
            ("c400", -4.0),
        ];
        for (hex_str, expected) in cases {
            let buf = ByteBuffer::from_hex(hex_str).unwrap();
            assert_eq!(buf.half_float_at(0).unwrap(), *expected, "{hex_str}");
        }

        let neg_zero = ByteBuffer::from_hex("8000").unwrap().half_float_at(0).unwrap();
        assert!(neg_zero == 0.0 && neg_zero.is_sign_negative());
        assert!(ByteBuffer::from_hex("7e00").unwrap().half_float_at(0).unwrap().is_nan());
        assert_eq!(
            ByteBuffer::from_hex("fc00").unwrap().half_float_at(0).unwrap(),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_single_and_double_floats() {
        let single = ByteBuffer::from_hex("47c35000").unwrap();
        assert_eq!(single.float_at(0).unwrap(), 100000.0);

        let double = ByteBuffer::from_hex("3ff199999999999a").unwrap();
        assert_eq!(double.double_at(0).unwrap(), 1.1);
    }

    #[test]
    fn test_base64url_with_and_without_padding() {
        let a = ByteBuffer::from_base64url("AQID").unwrap();
        let b = ByteBuffer::from_base64url("AQI=").unwrap();
        let c = ByteBuffer::from_base64url("AQI").unwrap();
        assert_eq!(a.as_slice(), &[1, 2, 3]);
        assert_eq!(b, c);
        assert_eq!(c.to_base64url(), "AQI");
        assert!(ByteBuffer::from_base64url("!!").is_err());
    }

    #[test]
    fn test_constant_time_equality() {
        let buf = ByteBuffer::new(vec![1, 2, 3]);
        assert!(buf.equals_constant_time(&[1, 2, 3]));
        assert!(!buf.equals_constant_time(&[1, 2, 4]));
        assert!(!buf.equals_constant_time(&[1, 2]));
    }
}
