use crate::bytes::ByteBuffer;
use crate::cbor::{CborMap, CborValue};
use crate::error::{AttestaError, Result};
use crate::pki::{der_to_pem, Certificate};

use super::android_key::AndroidKeyAttestationStatement;
use super::fido_u2f::FidoU2fAttestationStatement;
use super::packed::PackedAttestationStatement;

/// A parsed attestation statement, one variant per supported format.
#[derive(Debug, Clone)]
pub enum AttestationStatement {
    None,
    Packed(PackedAttestationStatement),
    FidoU2f(FidoU2fAttestationStatement),
    AndroidKey(AndroidKeyAttestationStatement),
}

impl AttestationStatement {
    pub fn format_id(&self) -> &'static str {
        match self {
            Self::None => super::none::FORMAT_ID,
            Self::Packed(_) => super::packed::FORMAT_ID,
            Self::FidoU2f(_) => super::fido_u2f::FORMAT_ID,
            Self::AndroidKey(_) => super::android_key::FORMAT_ID,
        }
    }

    /// The attestation certificate chain, leaf first. Empty for formats or
    /// modes without `x5c`.
    pub fn certificates(&self) -> &[X5cCertificate] {
        match self {
            Self::None => &[],
            Self::Packed(s) => s.certificates(),
            Self::FidoU2f(s) => s.certificates(),
            Self::AndroidKey(s) => s.certificates(),
        }
    }
}

/// One `x5c` entry, kept as DER and as PEM text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X5cCertificate {
    pub der: ByteBuffer,
    pub pem: String,
}

impl X5cCertificate {
    fn new(der: ByteBuffer) -> Self {
        let pem = der_to_pem(der.as_slice());
        Self { der, pem }
    }

    pub fn parse(&self) -> Result<Certificate> {
        Certificate::from_pem(&self.pem)
    }
}

/// Parse every certificate of an `x5c` list.
pub(crate) fn parse_chain(certificates: &[X5cCertificate]) -> Result<Vec<Certificate>> {
    certificates.iter().map(X5cCertificate::parse).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldType {
    Integer,
    Bytes,
    /// Non-empty array whose elements are all byte strings.
    CertificateArray,
}

impl FieldType {
    fn name(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Bytes => "byte string",
            Self::CertificateArray => "non-empty array of byte strings",
        }
    }

    fn accepts(self, value: &CborValue) -> bool {
        match self {
            Self::Integer => value.as_i64().is_some(),
            Self::Bytes => value.as_bytes().is_some(),
            Self::CertificateArray => value.as_array().is_some_and(|items| {
                !items.is_empty() && items.iter().all(|item| item.as_bytes().is_some())
            }),
        }
    }
}

/// Check presence and type of statement fields. `required` fields must be
/// present; `optional` fields are only type-checked when present.
pub(crate) fn check_fields(
    statement: &CborMap,
    format: &str,
    required: &[(&str, FieldType)],
    optional: &[(&str, FieldType)],
) -> Result<()> {
    let invalid = |detail: String| {
        AttestaError::Parse(format!("Invalid {format} attestation statement: {detail}"))
    };

    for (name, expected) in required {
        match statement.get_text(name) {
            None => return Err(invalid(format!("missing field '{name}'"))),
            Some(value) if !expected.accepts(value) => {
                return Err(invalid(format!(
                    "field '{name}' must be {}, got {}",
                    expected.name(),
                    value.type_name()
                )))
            }
            Some(_) => {}
        }
    }
    for (name, expected) in optional {
        if let Some(value) = statement.get_text(name) {
            if !expected.accepts(value) {
                return Err(invalid(format!(
                    "field '{name}' must be {}, got {}",
                    expected.name(),
                    value.type_name()
                )));
            }
        }
    }
    Ok(())
}

pub(crate) fn integer_field(statement: &CborMap, name: &str) -> Result<i64> {
    statement
        .get_text(name)
        .and_then(CborValue::as_i64)
        .ok_or_else(|| AttestaError::Parse(format!("statement field '{name}' is not an integer")))
}

pub(crate) fn bytes_field(statement: &CborMap, name: &str) -> Result<ByteBuffer> {
    statement
        .get_text(name)
        .and_then(CborValue::as_bytes)
        .cloned()
        .ok_or_else(|| AttestaError::Parse(format!("statement field '{name}' is not a byte string")))
}

pub(crate) fn x5c_field(statement: &CborMap) -> Vec<X5cCertificate> {
    statement
        .get_text("x5c")
        .and_then(CborValue::as_array)
        .unwrap_or_default()
        .iter()
        .filter_map(CborValue::as_bytes)
        .cloned()
        .map(X5cCertificate::new)
        .collect()
}
