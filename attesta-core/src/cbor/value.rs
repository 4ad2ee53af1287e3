use std::fmt;

use indexmap::IndexMap;

use crate::bytes::ByteBuffer;

/// A map key. Only integers and text strings are accepted as keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    /// Covers the full unsigned and negative CBOR integer ranges.
    Integer(i128),
    Text(String),
}

impl From<i64> for MapKey {
    fn from(value: i64) -> Self {
        Self::Integer(i128::from(value))
    }
}

impl From<u64> for MapKey {
    fn from(value: u64) -> Self {
        Self::Integer(i128::from(value))
    }
}

impl From<i32> for MapKey {
    fn from(value: i32) -> Self {
        Self::Integer(i128::from(value))
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MapKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Decoded CBOR map. Keeps insertion order; inserting an existing key
/// replaces its value in place. Lookups and inserts are constant time.
#[derive(Debug, Clone, Default)]
pub struct CborMap {
    entries: IndexMap<MapKey, CborValue>,
}

impl CborMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value for the key if any.
    pub fn insert(&mut self, key: impl Into<MapKey>, value: CborValue) -> Option<CborValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &MapKey) -> Option<&CborValue> {
        self.entries.get(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&CborValue> {
        self.entries.get(&MapKey::from(key))
    }

    pub fn get_int(&self, key: i64) -> Option<&CborValue> {
        self.entries.get(&MapKey::from(key))
    }

    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &CborValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.keys()
    }
}

/// Two maps are equal when they hold the same entries in the same order.
impl PartialEq for CborMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl<K: Into<MapKey>> FromIterator<(K, CborValue)> for CborMap {
    fn from_iter<I: IntoIterator<Item = (K, CborValue)>>(iter: I) -> Self {
        let mut map = CborMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// A decoded CBOR data item.
#[derive(Debug, Clone, PartialEq)]
pub enum CborValue {
    Unsigned(u64),
    /// Stored as the final value, i.e. `-1 - n` for encoded argument `n`.
    Negative(i64),
    Bytes(ByteBuffer),
    Text(String),
    Array(Vec<CborValue>),
    Map(CborMap),
    Float(f64),
    Bool(bool),
    Null,
}

impl CborValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unsigned(_) => "unsigned integer",
            Self::Negative(_) => "negative integer",
            Self::Bytes(_) => "byte string",
            Self::Text(_) => "text string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Float(_) => "float",
            Self::Bool(_) => "boolean",
            Self::Null => "null",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Unsigned(_) | Self::Negative(_))
    }

    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Self::Unsigned(n) => Some(i128::from(*n)),
            Self::Negative(n) => Some(i128::from(*n)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|n| i64::try_from(n).ok())
    }

    pub fn as_bytes(&self) -> Option<&ByteBuffer> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[CborValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&CborMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<i64> for CborValue {
    fn from(value: i64) -> Self {
        match u64::try_from(value) {
            Ok(n) => Self::Unsigned(n),
            Err(_) => Self::Negative(value),
        }
    }
}

impl From<&str> for CborValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CborValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ByteBuffer> for CborValue {
    fn from(value: ByteBuffer) -> Self {
        Self::Bytes(value)
    }
}

impl From<bool> for CborValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<CborMap> for CborValue {
    fn from(value: CborMap) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<CborValue>> for CborValue {
    fn from(value: Vec<CborValue>) -> Self {
        Self::Array(value)
    }
}

/// Diagnostic notation in the style of RFC 7049 section 6.
impl fmt::Display for CborValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(n) => write!(f, "{n}"),
            Self::Negative(n) => write!(f, "{n}"),
            Self::Bytes(b) => write!(f, "h'{}'", b.to_hex()),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Float(x) if x.is_nan() => f.write_str("NaN"),
            Self::Float(x) if x.is_infinite() && *x > 0.0 => f.write_str("Infinity"),
            Self::Float(x) if x.is_infinite() => f.write_str("-Infinity"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
        }
    }
}
