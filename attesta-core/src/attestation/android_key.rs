//! `android-key` attestation: a hardware-backed Android Keystore key whose
//! attestation certificate describes the key in a dedicated extension.

use tracing::debug;
use x509_parser::der_parser::ber::{parse_ber, BerObject};

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

pub const FORMAT_ID: &str = "android-key";

/// Android Keystore key attestation extension.
pub const KEY_DESCRIPTION_OID: &str = "1.3.6.1.4.1.11129.2.1.17";

/// `allApplications` tag inside an AuthorizationList.
const ALL_APPLICATIONS_TAG: u32 = 600;

const CHALLENGE_INDEX: usize = 4;
const SOFTWARE_ENFORCED_INDEX: usize = 6;
const TEE_ENFORCED_INDEX: usize = 7;

#[derive(Debug, Clone)]
pub struct AndroidKeyAttestationStatement {
    algorithm: CoseAlgorithm,
    signature: ByteBuffer,
    certificates: Vec<X5cCertificate>,
}

impl AndroidKeyAttestationStatement {
    pub fn parse(statement: &CborMap) -> Result<Self> {
        check_fields(
            statement,
            FORMAT_ID,
            &[
                ("alg", FieldType::Integer),
                ("x5c", FieldType::CertificateArray),
                ("sig", FieldType::Bytes),
            ],
            &[],
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
}

/// The parts of a KeyDescription the verifier needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescription {
    pub attestation_challenge: Vec<u8>,
    pub software_all_applications: bool,
    pub tee_all_applications: bool,
}

impl KeyDescription {
    /// Parse the DER `KeyDescription` SEQUENCE carried in the extension value.
    pub fn parse(der: &[u8]) -> Result<Self> {
        let malformed = |detail: &str| AttestaError::Parse(format!("Malformed KeyDescription: {detail}"));

        let (_, description) = parse_ber(der).map_err(|e| malformed(&e.to_string()))?;
        let fields = description
            .as_sequence()
            .map_err(|_| malformed("not a SEQUENCE"))?;
        if fields.len() <= TEE_ENFORCED_INDEX {
            return Err(malformed("too few fields"));
        }

        let attestation_challenge = fields[CHALLENGE_INDEX]
            .as_slice()
            .map_err(|_| malformed("attestationChallenge is not an OCTET STRING"))?
            .to_vec();

        Ok(Self {
            attestation_challenge,
            software_all_applications: has_all_applications(&fields[SOFTWARE_ENFORCED_INDEX])
                .ok_or_else(|| malformed("softwareEnforced is not a SEQUENCE"))?,
            tee_all_applications: has_all_applications(&fields[TEE_ENFORCED_INDEX])
                .ok_or_else(|| malformed("teeEnforced is not a SEQUENCE"))?,
        })
    }
}

fn has_all_applications(list: &BerObject<'_>) -> Option<bool> {
    let entries = list.as_sequence().ok()?;
    Some(
        entries
            .iter()
            .any(|entry| entry.header.tag().0 == ALL_APPLICATIONS_TAG),
    )
}

/// Verify an android-key statement against the authenticator data it covers.
pub fn verify(
    statement: &AndroidKeyAttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<VerificationResult> {
    let algorithm = statement.algorithm();
    if !algorithm.is_supported() {
        return Err(AttestaError::UnsupportedAlgorithm(algorithm.id()));
    }

    let chain = parse_chain(statement.certificates())?;
    let leaf = chain
        .first()
        .ok_or_else(|| AttestaError::Parse("android-key statement has no certificates".into()))?;
    let leaf_key = leaf.public_key()?;

    // Proof of possession over authenticatorData || clientDataHash.
    let mut message = auth_data.raw().to_vec();
    message.extend_from_slice(client_data_hash);
    if !verify_signature(algorithm, &leaf_key, &message, statement.signature().as_slice())? {
        return Err(AttestaError::VerificationFailed(
            "android-key attestation signature is invalid".into(),
        ));
    }

    // The attested key must be the credential key.
    let credential = auth_data.require_attested_credential()?;
    if !credential.public_key.matches_public_key(&leaf_key)? {
        return Err(AttestaError::VerificationFailed(
            "credential public key does not match the attestation certificate".into(),
        ));
    }

    let extension = leaf.extension_value(KEY_DESCRIPTION_OID)?.ok_or_else(|| {
        AttestaError::VerificationFailed("attestation certificate lacks the key description extension".into())
    })?;
    let description = KeyDescription::parse(&extension)?;

    let challenge = ByteBuffer::new(description.attestation_challenge);
    if !challenge.equals_constant_time(client_data_hash) {
        return Err(AttestaError::VerificationFailed(
            "attestation challenge does not match clientDataHash".into(),
        ));
    }
    if description.software_all_applications || description.tee_all_applications {
        return Err(AttestaError::VerificationFailed(
            "attested key is usable by all applications".into(),
        ));
    }

    debug!(certificates = chain.len(), "android-key attestation verified");
    Ok(VerificationResult::new(AttestationType::Basic, chain))
}

fn parse_statement(statement: &CborMap) -> Result<AttestationStatement> {
    AndroidKeyAttestationStatement::parse(statement).map(AttestationStatement::AndroidKey)
}

fn verify_statement(
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<VerificationResult> {
    match statement {
        AttestationStatement::AndroidKey(statement) => verify(statement, auth_data, client_data_hash),
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
