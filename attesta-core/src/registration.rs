//! Registration ceremony verification: attestation object in, trusted
//! credential out.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::attestation::{
    AttestationFormatRegistry, AttestationObject, AttestationType, VerificationResult,
};
use crate::auth_data::AuthenticatorData;
use crate::bytes::ByteBuffer;
use crate::cose::CoseKey;
use crate::error::{AttestaError, Result, ResultExt};
use crate::metadata::{AuthenticatorIdentifier, MetadataProvider, MetadataStatement};
use crate::pki::{Certificate, ChainValidator, X509ChainValidator};

/// SHA-256 of the client data JSON.
pub const CLIENT_DATA_HASH_LEN: usize = 32;

/// A verified registration, ready to be stored by the relying party.
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    pub credential_id: ByteBuffer,
    pub public_key: CoseKey,
    pub aaguid: Uuid,
    pub format: String,
    pub verification_result: VerificationResult,
    pub sign_count: u32,
    pub authenticator_data: AuthenticatorData,
    /// Statement of the authenticator model, when the metadata service knows it.
    pub metadata: Option<MetadataStatement>,
    /// The attestation chain validated against a configured or metadata trust anchor.
    pub trusted: bool,
}

/// Verifies attestation objects and evaluates trust in their attestation chains.
pub struct RegistrationVerifier {
    registry: AttestationFormatRegistry,
    chain_validator: Arc<dyn ChainValidator>,
    trust_anchors: Vec<Certificate>,
    metadata: Option<Arc<dyn MetadataProvider>>,
}

impl Default for RegistrationVerifier {
    fn default() -> Self {
        Self::new(AttestationFormatRegistry::new())
    }
}

impl fmt::Debug for RegistrationVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationVerifier")
            .field("registry", &self.registry)
            .field("trust_anchors", &self.trust_anchors.len())
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}

impl RegistrationVerifier {
    pub fn new(registry: AttestationFormatRegistry) -> Self {
        Self {
            registry,
            chain_validator: Arc::new(X509ChainValidator::new()),
            trust_anchors: Vec::new(),
            metadata: None,
        }
    }

    /// Trust attestation chains ending in `root`, in addition to metadata roots.
    pub fn with_trust_anchor(mut self, root: Certificate) -> Self {
        self.trust_anchors.push(root);
        self
    }

    pub fn with_metadata_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(provider);
        self
    }

    pub fn with_chain_validator(mut self, validator: Arc<dyn ChainValidator>) -> Self {
        self.chain_validator = validator;
        self
    }

    pub fn registry(&self) -> &AttestationFormatRegistry {
        &self.registry
    }

    /// Verify a registration response.
    ///
    /// Fails when the attestation does not verify or the metadata service
    /// reports the authenticator model as revoked or compromised. An
    /// attestation that verifies but chains to no known root is returned
    /// with `trusted == false`; whether to accept it is the caller's policy.
    pub async fn verify(
        &self,
        attestation_object: &ByteBuffer,
        client_data_hash: &[u8],
    ) -> Result<RegistrationResult> {
        if client_data_hash.len() != CLIENT_DATA_HASH_LEN {
            return Err(AttestaError::Parse(format!(
                "client data hash must be {CLIENT_DATA_HASH_LEN} bytes, got {}",
                client_data_hash.len()
            )));
        }

        let object = AttestationObject::parse(attestation_object)?;
        let (_, verification_result) = self.registry.verify(&object, client_data_hash)?;

        let auth_data = object.auth_data().clone();
        let credential = auth_data.require_attested_credential()?.clone();

        let metadata = match &self.metadata {
            Some(provider) => match identifier_for(credential.aaguid, &verification_result)? {
                Some(identifier) => provider
                    .get_metadata(&identifier)
                    .await
                    .context("metadata lookup")?,
                None => None,
            },
            None => None,
        };

        if let Some(statement) = &metadata {
            if statement.is_revoked() {
                warn!(aaguid = %credential.aaguid, "Authenticator model is revoked");
                return Err(AttestaError::VerificationFailed(
                    "authenticator model is revoked by the metadata service".into(),
                ));
            }
            if statement.is_compromised() {
                warn!(aaguid = %credential.aaguid, status = ?statement.current_status(), "Authenticator model is compromised");
                return Err(AttestaError::VerificationFailed(
                    "authenticator model has a compromise status report".into(),
                ));
            }
        }

        let trusted = self.is_trusted(&verification_result, metadata.as_ref());
        info!(
            format = object.format(),
            attestation_type = %verification_result.attestation_type(),
            aaguid = %credential.aaguid,
            has_metadata = metadata.is_some(),
            trusted,
            "Registration verified"
        );

        Ok(RegistrationResult {
            credential_id: credential.credential_id,
            public_key: credential.public_key,
            aaguid: credential.aaguid,
            format: object.format().to_string(),
            sign_count: auth_data.sign_count(),
            verification_result,
            authenticator_data: auth_data,
            metadata,
            trusted,
        })
    }

    fn is_trusted(&self, result: &VerificationResult, metadata: Option<&MetadataStatement>) -> bool {
        match result.attestation_type() {
            AttestationType::Basic | AttestationType::AttCa | AttestationType::AnonCa => {}
            AttestationType::None | AttestationType::SelfAttestation => return false,
        }

        let metadata_anchors = metadata.map(MetadataStatement::trust_anchors).unwrap_or_default();
        let trusted = self
            .trust_anchors
            .iter()
            .chain(metadata_anchors.iter())
            .any(|root| self.chain_validator.validate_chain(root, result.trust_path()));
        if !trusted {
            debug!(
                anchors = self.trust_anchors.len() + metadata_anchors.len(),
                "Attestation chain matches no trust anchor"
            );
        }
        trusted
    }
}

/// AAGUID when it is set, otherwise the key identifier of the attestation certificate.
fn identifier_for(
    aaguid: Uuid,
    result: &VerificationResult,
) -> Result<Option<AuthenticatorIdentifier>> {
    if let Some(identifier) = AuthenticatorIdentifier::from_aaguid(aaguid) {
        return Ok(Some(identifier));
    }
    match result.trust_path().first() {
        Some(leaf) => Ok(Some(AuthenticatorIdentifier::key_identifier(
            leaf.key_identifier()?,
        ))),
        None => Ok(None),
    }
}
