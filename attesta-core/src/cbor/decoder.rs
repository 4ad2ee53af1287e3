use crate::bytes::ByteBuffer;

use super::value::{CborMap, CborValue, MapKey};
use super::CborError;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTE_STRING: u8 = 2;
const MAJOR_TEXT_STRING: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

const LENGTH_1_BYTE: u8 = 24;
const LENGTH_2_BYTES: u8 = 25;
const LENGTH_4_BYTES: u8 = 26;
const LENGTH_8_BYTES: u8 = 27;
const LENGTH_INDEFINITE: u8 = 31;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;

/// How repeated map keys are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateKeys {
    /// The last occurrence wins.
    #[default]
    LastWins,
    /// Fail the decode with [`CborError::DuplicateMapKey`].
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub duplicate_keys: DuplicateKeys,
    /// Maximum array/map/tag nesting before the decode is aborted.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            duplicate_keys: DuplicateKeys::LastWins,
            max_depth: 64,
        }
    }
}

impl DecodeOptions {
    pub fn strict() -> Self {
        Self {
            duplicate_keys: DuplicateKeys::Reject,
            ..Self::default()
        }
    }
}

/// Decode exactly one data item spanning the whole buffer.
pub fn decode(buf: &ByteBuffer) -> Result<CborValue, CborError> {
    decode_with(buf, DecodeOptions::default())
}

pub fn decode_with(buf: &ByteBuffer, options: DecodeOptions) -> Result<CborValue, CborError> {
    let (value, end) = decode_in_place_with(buf, 0, options)?;
    if end != buf.len() {
        return Err(CborError::UnusedBytes(buf.len() - end));
    }
    Ok(value)
}

/// Decode one data item starting at `start`, returning it together with the
/// offset just past its last byte. Trailing bytes are left to the caller.
pub fn decode_in_place(buf: &ByteBuffer, start: usize) -> Result<(CborValue, usize), CborError> {
    decode_in_place_with(buf, start, DecodeOptions::default())
}

pub fn decode_in_place_with(
    buf: &ByteBuffer,
    start: usize,
    options: DecodeOptions,
) -> Result<(CborValue, usize), CborError> {
    Parser { buf, options }.item(start, 0)
}

struct Parser<'a> {
    buf: &'a ByteBuffer,
    options: DecodeOptions,
}

impl Parser<'_> {
    fn item(&self, offset: usize, depth: usize) -> Result<(CborValue, usize), CborError> {
        if depth > self.options.max_depth {
            return Err(CborError::NestingTooDeep(self.options.max_depth));
        }

        let first = self.buf.byte_at(offset)?;
        let major = first >> 5;
        let info = first & 0x1f;
        let offset = offset + 1;

        if major == MAJOR_SIMPLE {
            return self.simple_or_float(info, offset);
        }

        let (argument, offset) = self.argument(info, offset)?;
        match major {
            MAJOR_UNSIGNED => Ok((CborValue::Unsigned(argument), offset)),
            MAJOR_NEGATIVE => {
                let n = i64::try_from(argument).map_err(|_| CborError::IntegerOutOfRange(argument))?;
                Ok((CborValue::Negative(-1 - n), offset))
            }
            MAJOR_BYTE_STRING => {
                let len = to_length(argument)?;
                let bytes = self.buf.sub_buffer(offset, len)?;
                Ok((CborValue::Bytes(bytes), offset + len))
            }
            MAJOR_TEXT_STRING => {
                let len = to_length(argument)?;
                let raw = self.buf.bytes_at(offset, len)?;
                let text = std::str::from_utf8(raw)
                    .map_err(|e| CborError::InvalidUtf8(e.to_string()))?;
                Ok((CborValue::Text(text.to_string()), offset + len))
            }
            MAJOR_ARRAY => self.array(to_length(argument)?, offset, depth),
            MAJOR_MAP => self.map(to_length(argument)?, offset, depth),
            // Tag number is discarded; the tagged item is returned as-is.
            MAJOR_TAG => self.item(offset, depth + 1),
            _ => unreachable!("major type is a 3-bit value"),
        }
    }

    /// Read the argument encoded by the additional-information bits.
    fn argument(&self, info: u8, offset: usize) -> Result<(u64, usize), CborError> {
        match info {
            0..=23 => Ok((u64::from(info), offset)),
            LENGTH_1_BYTE => Ok((u64::from(self.buf.byte_at(offset)?), offset + 1)),
            LENGTH_2_BYTES => Ok((u64::from(self.buf.u16_at(offset)?), offset + 2)),
            LENGTH_4_BYTES => Ok((u64::from(self.buf.u32_at(offset)?), offset + 4)),
            LENGTH_8_BYTES => Ok((self.buf.u64_at(offset)?, offset + 8)),
            LENGTH_INDEFINITE => Err(CborError::IndefiniteLength),
            _ => Err(CborError::ReservedValue),
        }
    }

    fn simple_or_float(&self, info: u8, offset: usize) -> Result<(CborValue, usize), CborError> {
        match info {
            LENGTH_1_BYTE => {
                let simple = self.buf.byte_at(offset)?;
                Ok((simple_value(simple)?, offset + 1))
            }
            LENGTH_2_BYTES => Ok((CborValue::Float(self.buf.half_float_at(offset)?), offset + 2)),
            LENGTH_4_BYTES => Ok((CborValue::Float(self.buf.float_at(offset)?), offset + 4)),
            LENGTH_8_BYTES => Ok((CborValue::Float(self.buf.double_at(offset)?), offset + 8)),
            LENGTH_INDEFINITE => Err(CborError::IndefiniteLength),
            28..=30 => Err(CborError::ReservedValue),
            _ => Ok((simple_value(info)?, offset)),
        }
    }

    fn array(
        &self,
        count: usize,
        mut offset: usize,
        depth: usize,
    ) -> Result<(CborValue, usize), CborError> {
        // Every item takes at least one byte, so the remaining input bounds the allocation.
        let mut items = Vec::with_capacity(count.min(self.buf.len().saturating_sub(offset)));
        for _ in 0..count {
            let (item, next) = self.item(offset, depth + 1)?;
            items.push(item);
            offset = next;
        }
        Ok((CborValue::Array(items), offset))
    }

    fn map(
        &self,
        count: usize,
        mut offset: usize,
        depth: usize,
    ) -> Result<(CborValue, usize), CborError> {
        let mut map = CborMap::new();
        for _ in 0..count {
            let (key, next) = self.item(offset, depth + 1)?;
            let key = match key {
                CborValue::Unsigned(n) => MapKey::from(n),
                CborValue::Negative(n) => MapKey::from(n),
                CborValue::Text(s) => MapKey::Text(s),
                other => return Err(CborError::InvalidMapKey(other.type_name())),
            };
            let (value, next) = self.item(next, depth + 1)?;
            offset = next;

            if self.options.duplicate_keys == DuplicateKeys::Reject && map.contains_key(&key) {
                return Err(CborError::DuplicateMapKey(key.to_string()));
            }
            map.insert(key, value);
        }
        Ok((CborValue::Map(map), offset))
    }
}

fn simple_value(simple: u8) -> Result<CborValue, CborError> {
    match simple {
        SIMPLE_FALSE => Ok(CborValue::Bool(false)),
        SIMPLE_TRUE => Ok(CborValue::Bool(true)),
        SIMPLE_NULL => Ok(CborValue::Null),
        other => Err(CborError::UnsupportedSimpleValue(other)),
    }
}

fn to_length(argument: u64) -> Result<usize, CborError> {
    usize::try_from(argument).map_err(|_| CborError::LengthOverflow(argument))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_hex(hex_str: &str) -> Result<CborValue, CborError> {
        decode(&ByteBuffer::from_hex(hex_str).unwrap())
    }

    #[test]
    fn test_decode_in_place() {
        let buf = ByteBuffer::from_hex("01020304830102030809 0A0B".replace(' ', "").as_str()).unwrap();
        let (value, end) = decode_in_place(&buf, 4).unwrap();

        assert_eq!(
            value,
            CborValue::Array(vec![
                CborValue::Unsigned(1),
                CborValue::Unsigned(2),
                CborValue::Unsigned(3)
            ])
        );
        assert_eq!(end, 8);
    }

    #[test]
    fn test_negative_integers() {
        assert_eq!(decode_hex("20").unwrap(), CborValue::Negative(-1));
        assert_eq!(decode_hex("3863").unwrap(), CborValue::Negative(-100));
        assert_eq!(decode_hex("3903e7").unwrap(), CborValue::Negative(-1000));
        assert_eq!(
            decode_hex("3b7fffffffffffffff").unwrap(),
            CborValue::Negative(i64::MIN)
        );
        assert_eq!(
            decode_hex("3bffffffffffffffff").unwrap_err(),
            CborError::IntegerOutOfRange(u64::MAX)
        );
    }

    #[test]
    fn test_tag_decodes_single_nested_item() {
        // 1(1363896240)
        assert_eq!(
            decode_hex("c11a514b67b0").unwrap(),
            CborValue::Unsigned(1363896240)
        );
        // 24(h'6449455446') keeps the byte string
        assert_eq!(
            decode_hex("d818456449455446").unwrap(),
            CborValue::Bytes(ByteBuffer::from_hex("6449455446").unwrap())
        );
    }

    #[test]
    fn test_corrupt_array_fails() {
        let err = decode_hex("830102").unwrap_err();
        assert!(matches!(err, CborError::Buffer(_)));
        assert!(err.to_string().contains("byte buffer"));
    }

    #[test]
    fn test_invalid_map_key() {
        let err = decode_hex("a1806162").unwrap_err();
        assert!(err.to_string().to_lowercase().contains("map key"));
    }

    #[test]
    fn test_indefinite_length() {
        let err = decode_hex("9f0102ff").unwrap_err();
        assert_eq!(err, CborError::IndefiniteLength);
        assert!(err.to_string().to_lowercase().contains("indefinite"));
    }

    #[test]
    fn test_reserved_float_marker() {
        let err = decode_hex("fe").unwrap_err();
        assert!(err.to_string().to_lowercase().contains("reserved"));
    }

    #[test]
    fn test_break_outside_indefinite_item() {
        let err = decode_hex("ff").unwrap_err();
        assert!(err.to_string().to_lowercase().contains("indefinite"));
    }

    #[test]
    fn test_reserved_length_marker() {
        let err = decode_hex("1e").unwrap_err();
        assert!(err.to_string().to_lowercase().contains("reserved"));
    }

    #[test]
    fn test_additional_data() {
        let err = decode_hex("1020").unwrap_err();
        assert!(err.to_string().to_lowercase().contains("unused bytes"));
    }

    #[test]
    fn test_unsupported_simple_values() {
        assert_eq!(
            decode_hex("f0").unwrap_err(),
            CborError::UnsupportedSimpleValue(16)
        );
        assert_eq!(
            decode_hex("f7").unwrap_err(),
            CborError::UnsupportedSimpleValue(23)
        );
        assert_eq!(
            decode_hex("f8ff").unwrap_err(),
            CborError::UnsupportedSimpleValue(255)
        );
        assert_eq!(decode_hex("f815").unwrap(), CborValue::Bool(true));
    }

    #[test]
    fn test_duplicate_keys() {
        let buf = ByteBuffer::from_hex("a2616101616102").unwrap();

        let value = decode(&buf).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_text("a"), Some(&CborValue::Unsigned(2)));

        let err = decode_with(&buf, DecodeOptions::strict()).unwrap_err();
        assert!(matches!(err, CborError::DuplicateMapKey(_)));
    }

    #[test]
    fn test_invalid_utf8() {
        assert!(matches!(
            decode_hex("62c328").unwrap_err(),
            CborError::InvalidUtf8(_)
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let mut bytes = vec![0x81; 100];
        bytes.push(0x00);
        let err = decode(&ByteBuffer::new(bytes)).unwrap_err();
        assert_eq!(err, CborError::NestingTooDeep(64));
    }

    #[test]
    fn test_huge_declared_length_fails_cleanly() {
        assert!(matches!(
            decode_hex("9b00000000ffffffff").unwrap_err(),
            CborError::Buffer(_)
        ));
        assert!(matches!(
            decode_hex("5bffffffffffffffff").unwrap_err(),
            CborError::Buffer(_) | CborError::LengthOverflow(_)
        ));
    }
}
