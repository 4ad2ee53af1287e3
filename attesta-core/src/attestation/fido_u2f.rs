//! `fido-u2f` attestation from legacy U2F authenticators.

use openssl::nid::Nid;

use crate::auth_data::AuthenticatorData;
use crate::bytes::ByteBuffer;
use crate::cbor::CborMap;
use crate::cose::{CoseAlgorithm, CoseKey, EcCurve};
use crate::error::{AttestaError, Result};
use crate::pki::verify_signature;

use super::registry::AttestationFormat;
use super::result::{AttestationType, VerificationResult};
use super::statement::{
    bytes_field, check_fields, parse_chain, x5c_field, AttestationStatement, FieldType,
    X5cCertificate,
};

pub const FORMAT_ID: &str = "fido-u2f";

#[derive(Debug, Clone)]
pub struct FidoU2fAttestationStatement {
    signature: ByteBuffer,
    certificates: Vec<X5cCertificate>,
}

impl FidoU2fAttestationStatement {
    pub fn parse(statement: &CborMap) -> Result<Self> {
        check_fields(
            statement,
            FORMAT_ID,
            &[("sig", FieldType::Bytes), ("x5c", FieldType::CertificateArray)],
            &[],
        )?;
        let certificates = x5c_field(statement);
        if certificates.len() != 1 {
            return Err(AttestaError::Parse(format!(
                "Invalid {FORMAT_ID} attestation statement: x5c must hold exactly one certificate"
            )));
        }

        Ok(Self {
            signature: bytes_field(statement, "sig")?,
            certificates,
        })
    }

    pub fn signature(&self) -> &ByteBuffer {
        &self.signature
    }

    pub fn certificates(&self) -> &[X5cCertificate] {
        &self.certificates
    }
}

pub fn verify(
    statement: &FidoU2fAttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<VerificationResult> {
    let chain = parse_chain(statement.certificates())?;
    let leaf = chain
        .first()
        .ok_or_else(|| AttestaError::Parse("fido-u2f statement has no certificate".into()))?;

    let leaf_key = leaf.public_key()?;
    let on_p256 = leaf_key
        .ec_key()
        .ok()
        .and_then(|ec| ec.group().curve_name())
        == Some(Nid::X9_62_PRIME256V1);
    if !on_p256 {
        return Err(AttestaError::VerificationFailed(
            "fido-u2f certificate key is not a P-256 key".into(),
        ));
    }

    let credential = auth_data.require_attested_credential()?;
    let point = match &credential.public_key {
        key @ CoseKey::Ec2 {
            curve: EcCurve::P256,
            ..
        } => key.uncompressed_point(),
        _ => None,
    }
    .ok_or_else(|| {
        AttestaError::VerificationFailed("fido-u2f credential key is not a P-256 key".into())
    })?;

    let mut message = Vec::with_capacity(1 + 32 + client_data_hash.len() + 64 + point.len());
    message.push(0x00);
    message.extend_from_slice(auth_data.rp_id_hash());
    message.extend_from_slice(client_data_hash);
    message.extend_from_slice(credential.credential_id.as_slice());
    message.extend_from_slice(&point);

    if !verify_signature(
        CoseAlgorithm::Es256,
        &leaf_key,
        &message,
        statement.signature().as_slice(),
    )? {
        return Err(AttestaError::VerificationFailed(
            "fido-u2f attestation signature is invalid".into(),
        ));
    }

    Ok(VerificationResult::new(AttestationType::Basic, chain))
}

fn parse_statement(statement: &CborMap) -> Result<AttestationStatement> {
    FidoU2fAttestationStatement::parse(statement).map(AttestationStatement::FidoU2f)
}

fn verify_statement(
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<VerificationResult> {
    match statement {
        AttestationStatement::FidoU2f(statement) => verify(statement, auth_data, client_data_hash),
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
