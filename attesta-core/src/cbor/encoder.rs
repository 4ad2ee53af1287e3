use super::value::{CborMap, CborValue, MapKey};

fn encode_header(major: u8, argument: u64) -> Vec<u8> {
    let major = major << 5;
    if argument < 24 {
        vec![major | argument as u8]
    } else if let Ok(n) = u8::try_from(argument) {
        vec![major | 24, n]
    } else if let Ok(n) = u16::try_from(argument) {
        let mut out = vec![major | 25];
        out.extend_from_slice(&n.to_be_bytes());
        out
    } else if let Ok(n) = u32::try_from(argument) {
        let mut out = vec![major | 26];
        out.extend_from_slice(&n.to_be_bytes());
        out
    } else {
        let mut out = vec![major | 27];
        out.extend_from_slice(&argument.to_be_bytes());
        out
    }
}

pub fn encode_unsigned(value: u64) -> Vec<u8> {
    encode_header(0, value)
}

/// Shortest encoding of a signed integer (major type 0 or 1).
pub fn encode_integer(value: i64) -> Vec<u8> {
    match u64::try_from(value) {
        Ok(n) => encode_header(0, n),
        // -1 - value is non-negative for every negative i64
        Err(_) => encode_header(1, (-1 - value) as u64),
    }
}

fn encode_wide_integer(value: i128) -> Vec<u8> {
    if value >= 0 {
        encode_header(0, value as u64)
    } else {
        encode_header(1, (-1 - value) as u64)
    }
}

pub fn encode_text_string(value: &str) -> Vec<u8> {
    let mut out = encode_header(3, value.len() as u64);
    out.extend_from_slice(value.as_bytes());
    out
}

pub fn encode_byte_string(value: &[u8]) -> Vec<u8> {
    let mut out = encode_header(2, value.len() as u64);
    out.extend_from_slice(value);
    out
}

pub fn encode_bool(value: bool) -> Vec<u8> {
    vec![if value { 0xf5 } else { 0xf4 }]
}

pub fn encode_null() -> Vec<u8> {
    vec![0xf6]
}

/// Floats are always written as IEEE 754 double precision.
pub fn encode_float(value: f64) -> Vec<u8> {
    let mut out = vec![0xfb];
    out.extend_from_slice(&value.to_be_bytes());
    out
}

pub fn encode_array(items: &[CborValue]) -> Vec<u8> {
    let mut out = encode_header(4, items.len() as u64);
    for item in items {
        out.extend(encode_value(item));
    }
    out
}

/// Encode a map from already-encoded keys and values in canonical order:
/// shorter encoded keys first, equal lengths compared byte by byte.
pub fn encode_map_values<I>(entries: I) -> Vec<u8>
where
    I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
{
    let mut entries: Vec<(Vec<u8>, Vec<u8>)> = entries.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let mut out = encode_header(5, entries.len() as u64);
    for (key, value) in entries {
        out.extend(key);
        out.extend(value);
    }
    out
}

pub fn encode_map(map: &CborMap) -> Vec<u8> {
    encode_map_values(
        map.iter()
            .map(|(key, value)| (encode_key(key), encode_value(value))),
    )
}

fn encode_key(key: &MapKey) -> Vec<u8> {
    match key {
        MapKey::Integer(n) => encode_wide_integer(*n),
        MapKey::Text(s) => encode_text_string(s),
    }
}

/// Canonical encoding of any value this codec can decode.
pub fn encode_value(value: &CborValue) -> Vec<u8> {
    match value {
        CborValue::Unsigned(n) => encode_unsigned(*n),
        CborValue::Negative(n) => encode_integer(*n),
        CborValue::Bytes(b) => encode_byte_string(b.as_slice()),
        CborValue::Text(s) => encode_text_string(s),
        CborValue::Array(items) => encode_array(items),
        CborValue::Map(map) => encode_map(map),
        CborValue::Float(x) => encode_float(*x),
        CborValue::Bool(b) => encode_bool(*b),
        CborValue::Null => encode_null(),
    }
}
