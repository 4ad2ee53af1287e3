use crate::auth_data::AuthenticatorData;
use crate::cbor::CborMap;
use crate::error::{AttestaError, Result};

use super::registry::AttestationFormat;
use super::result::{AttestationType, VerificationResult};
use super::statement::AttestationStatement;

pub const FORMAT_ID: &str = "none";

fn parse_statement(statement: &CborMap) -> Result<AttestationStatement> {
    if !statement.is_empty() {
        return Err(AttestaError::Parse(
            "Invalid none attestation statement: must be an empty map".into(),
        ));
    }
    Ok(AttestationStatement::None)
}

fn verify_statement(
    statement: &AttestationStatement,
    _auth_data: &AuthenticatorData,
    _client_data_hash: &[u8],
) -> Result<VerificationResult> {
    match statement {
        AttestationStatement::None => Ok(VerificationResult::new(AttestationType::None, Vec::new())),
        other => Err(AttestaError::UnsupportedFormat(format!(
            "{} statement passed to the {FORMAT_ID} verifier",
            other.format_id()
        ))),
    }
}

pub fn format() -> AttestationFormat {
    AttestationFormat {
        id: FORMAT_ID,
        parse: parse_statement,
        verify: verify_statement,
    }
}
