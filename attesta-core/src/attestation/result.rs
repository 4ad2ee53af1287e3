use std::fmt;

use crate::pki::Certificate;

/// Trust level a verifier established for the attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttestationType {
    None,
    SelfAttestation,
    Basic,
    AttCa,
    AnonCa,
}

impl fmt::Display for AttestationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::SelfAttestation => "self",
            Self::Basic => "basic",
            Self::AttCa => "attca",
            Self::AnonCa => "anonca",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct VerificationResult {
    attestation_type: AttestationType,
    trust_path: Vec<Certificate>,
}

impl VerificationResult {
    pub fn new(attestation_type: AttestationType, trust_path: Vec<Certificate>) -> Self {
        Self {
            attestation_type,
            trust_path,
        }
    }

    pub fn attestation_type(&self) -> AttestationType {
        self.attestation_type
    }

    /// Certificates the attestation relies on, leaf first.
    pub fn trust_path(&self) -> &[Certificate] {
        &self.trust_path
    }
}
