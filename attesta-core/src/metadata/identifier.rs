use std::fmt;

use uuid::Uuid;

/// How an authenticator model is named in the metadata TOC.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthenticatorIdentifier {
    /// FIDO2 authenticators.
    Aaguid(Uuid),
    /// UAF authenticators, `"VVVV#MMMM"`.
    Aaid(String),
    /// U2F authenticators: hex SHA-1 of the attestation certificate public key.
    KeyIdentifier(String),
}

impl AuthenticatorIdentifier {
    /// `None` for the all-zero AAGUID, which identifies nothing.
    pub fn from_aaguid(aaguid: Uuid) -> Option<Self> {
        (!aaguid.is_nil()).then_some(Self::Aaguid(aaguid))
    }

    pub fn key_identifier(hex: impl Into<String>) -> Self {
        Self::KeyIdentifier(hex.into().to_ascii_lowercase())
    }
}

impl fmt::Display for AuthenticatorIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aaguid(aaguid) => write!(f, "aaguid:{aaguid}"),
            Self::Aaid(aaid) => write!(f, "aaid:{aaid}"),
            Self::KeyIdentifier(key_id) => write!(f, "key-id:{key_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_aaguid_is_not_an_identifier() {
        assert!(AuthenticatorIdentifier::from_aaguid(Uuid::nil()).is_none());

        let aaguid = Uuid::parse_str("cb69481e-8ff7-4039-93ec-0a2729a154a8").unwrap();
        let id = AuthenticatorIdentifier::from_aaguid(aaguid).unwrap();
        assert_eq!(id.to_string(), "aaguid:cb69481e-8ff7-4039-93ec-0a2729a154a8");
    }

    #[test]
    fn test_key_identifier_is_lowercased() {
        assert_eq!(
            AuthenticatorIdentifier::key_identifier("ABCDEF"),
            AuthenticatorIdentifier::KeyIdentifier("abcdef".into())
        );
    }
}
