//! `packed` attestation, with a certificate chain (basic) or signed by the
//! credential key itself (self attestation).

use crate::auth_data::AuthenticatorData;
use crate::bytes::ByteBuffer;
use crate::cbor::CborMap;
use crate::cose::CoseAlgorithm;
use crate::error::{AttestaError, Result};
use crate::pki::verify_signature;

use super::registry::AttestationFormat;
use super::result::{AttestationType, VerificationResult};
use super::statement::{
    bytes_field, check_fields, integer_field, parse_chain, x5c_field, AttestationStatement,
    FieldType, X5cCertificate,
};

pub const FORMAT_ID: &str = "packed";

/// FIDO extension carrying the authenticator AAGUID.
pub const FIDO_AAGUID_OID: &str = "1.3.6.1.4.1.45724.1.1.4";

#[derive(Debug, Clone)]
pub struct PackedAttestationStatement {
    algorithm: CoseAlgorithm,
    signature: ByteBuffer,
    certificates: Vec<X5cCertificate>,
}

impl PackedAttestationStatement {
    pub fn parse(statement: &CborMap) -> Result<Self> {
        if statement.get_text("ecdaaKeyId").is_some() {
            return Err(AttestaError::UnsupportedFormat(
                "ECDAA packed attestation".into(),
            ));
        }
        check_fields(
            statement,
            FORMAT_ID,
            &[("alg", FieldType::Integer), ("sig", FieldType::Bytes)],
            &[("x5c", FieldType::CertificateArray)],
        )?;

        Ok(Self {
            algorithm: CoseAlgorithm::from_id(integer_field(statement, "alg")?),
            signature: bytes_field(statement, "sig")?,
            certificates: x5c_field(statement),
        })
    }

    pub fn algorithm(&self) -> CoseAlgorithm {
        self.algorithm
    }

    pub fn signature(&self) -> &ByteBuffer {
        &self.signature
    }

    pub fn certificates(&self) -> &[X5cCertificate] {
        &self.certificates
    }

    pub fn is_self_attestation(&self) -> bool {
        self.certificates.is_empty()
    }
}

pub fn verify(
    statement: &PackedAttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<VerificationResult> {
    let algorithm = statement.algorithm();
    if !algorithm.is_supported() {
        return Err(AttestaError::UnsupportedAlgorithm(algorithm.id()));
    }

    let credential = auth_data.require_attested_credential()?;
    let mut message = auth_data.raw().to_vec();
    message.extend_from_slice(client_data_hash);

    if statement.is_self_attestation() {
        if credential.public_key.algorithm() != Some(algorithm) {
            return Err(AttestaError::VerificationFailed(
                "self attestation algorithm differs from the credential key algorithm".into(),
            ));
        }
        let key = credential.public_key.to_public_key()?;
        if !verify_signature(algorithm, &key, &message, statement.signature().as_slice())? {
            return Err(AttestaError::VerificationFailed(
                "packed self attestation signature is invalid".into(),
            ));
        }
        return Ok(VerificationResult::new(AttestationType::SelfAttestation, Vec::new()));
    }

    let chain = parse_chain(statement.certificates())?;
    let leaf = chain
        .first()
        .ok_or_else(|| AttestaError::Parse("packed statement has no certificates".into()))?;

    let leaf_key = leaf.public_key()?;
    if !verify_signature(
        algorithm,
        &leaf_key,
        &message,
        statement.signature().as_slice(),
    )? {
        return Err(AttestaError::VerificationFailed(
            "packed attestation signature is invalid".into(),
        ));
    }

    if leaf.is_ca()? {
        return Err(AttestaError::VerificationFailed(
            "packed attestation certificate must not be a CA".into(),
        ));
    }

    if let Some(aaguid) = leaf.octet_string_extension(FIDO_AAGUID_OID)? {
        if aaguid.as_slice() != credential.aaguid.as_bytes() {
            return Err(AttestaError::VerificationFailed(
                "certificate AAGUID extension does not match authenticator data".into(),
            ));
        }
    }

    Ok(VerificationResult::new(AttestationType::Basic, chain))
}

fn parse_statement(statement: &CborMap) -> Result<AttestationStatement> {
    PackedAttestationStatement::parse(statement).map(AttestationStatement::Packed)
}

fn verify_statement(
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<VerificationResult> {
    match statement {
        AttestationStatement::Packed(statement) => verify(statement, auth_data, client_data_hash),
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
