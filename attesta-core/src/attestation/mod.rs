//! Attestation objects, statement formats and their verifiers.
//!
//! Every format follows the same two stages: a signature check proving the
//! attestation key signed `authenticatorData || clientDataHash` (or the
//! format's equivalent message), then format-specific binding checks. Trust in
//! the attestation key itself is decided afterwards by chain validation.

pub mod android_key;
pub mod fido_u2f;
pub mod none;
pub mod packed;
mod registry;
mod result;
mod statement;

use crate::auth_data::AuthenticatorData;
use crate::bytes::ByteBuffer;
use crate::cbor::{self, CborMap, CborValue, DecodeOptions};
use crate::error::{AttestaError, Result, ResultExt};

pub use android_key::AndroidKeyAttestationStatement;
pub use fido_u2f::FidoU2fAttestationStatement;
pub use packed::PackedAttestationStatement;
pub use registry::{AttestationFormat, AttestationFormatRegistry, ParseFn, VerifyFn};
pub use result::{AttestationType, VerificationResult};
pub use statement::{AttestationStatement, X5cCertificate};

/// The decoded `attestationObject` of a registration response.
#[derive(Debug, Clone)]
pub struct AttestationObject {
    format: String,
    statement: CborMap,
    auth_data: AuthenticatorData,
}

impl AttestationObject {
    pub fn parse(data: &ByteBuffer) -> Result<Self> {
        let value = cbor::decode_with(data, DecodeOptions::strict()).context("attestation object")?;
        let map = match value {
            CborValue::Map(map) => map,
            other => {
                return Err(AttestaError::Parse(format!(
                    "attestation object must be a map, got {}",
                    other.type_name()
                )))
            }
        };

        let format = match map.get_text("fmt") {
            Some(CborValue::Text(fmt)) => fmt.clone(),
            _ => return Err(AttestaError::Parse("attestation object has no text 'fmt'".into())),
        };
        let statement = match map.get_text("attStmt") {
            Some(CborValue::Map(stmt)) => stmt.clone(),
            _ => return Err(AttestaError::Parse("attestation object has no map 'attStmt'".into())),
        };
        let auth_data = match map.get_text("authData") {
            Some(CborValue::Bytes(raw)) => {
                AuthenticatorData::parse(raw.clone()).context("authenticator data")?
            }
            _ => {
                return Err(AttestaError::Parse(
                    "attestation object has no byte string 'authData'".into(),
                ))
            }
        };

        Ok(Self {
            format,
            statement,
            auth_data,
        })
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn statement(&self) -> &CborMap {
        &self.statement
    }

    pub fn auth_data(&self) -> &AuthenticatorData {
        &self.auth_data
    }
}
