use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::auth_data::AuthenticatorData;
use crate::cbor::CborMap;
use crate::error::{AttestaError, Result, ResultExt};

use super::result::VerificationResult;
use super::statement::AttestationStatement;
use super::AttestationObject;

pub type ParseFn = fn(&CborMap) -> Result<AttestationStatement>;
pub type VerifyFn =
    fn(&AttestationStatement, &AuthenticatorData, &[u8]) -> Result<VerificationResult>;

/// A statement parser and its verifier, registered under a format id.
#[derive(Clone, Copy)]
pub struct AttestationFormat {
    pub id: &'static str,
    pub parse: ParseFn,
    pub verify: VerifyFn,
}

impl fmt::Debug for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationFormat").field("id", &self.id).finish()
    }
}

/// Statement parsers and verifiers keyed by format id.
#[derive(Debug, Clone)]
pub struct AttestationFormatRegistry {
    formats: HashMap<&'static str, AttestationFormat>,
}

impl Default for AttestationFormatRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(super::none::format());
        registry.register(super::packed::format());
        registry.register(super::fido_u2f::format());
        registry.register(super::android_key::format());
        registry
    }
}

impl AttestationFormatRegistry {
    /// Registry with the built-in formats.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            formats: HashMap::new(),
        }
    }

    /// Add or replace a format.
    pub fn register(&mut self, format: AttestationFormat) {
        self.formats.insert(format.id, format);
    }

    pub fn get(&self, id: &str) -> Result<&AttestationFormat> {
        self.formats
            .get(id)
            .ok_or_else(|| AttestaError::UnsupportedFormat(id.to_string()))
    }

    pub fn format_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.formats.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn parse_statement(&self, object: &AttestationObject) -> Result<AttestationStatement> {
        let format = self.get(object.format())?;
        (format.parse)(object.statement()).context("attestation statement")
    }

    /// Parse the statement with its format's parser and run its verifier.
    pub fn verify(
        &self,
        object: &AttestationObject,
        client_data_hash: &[u8],
    ) -> Result<(AttestationStatement, VerificationResult)> {
        let format = self.get(object.format())?;
        let statement = (format.parse)(object.statement()).context("attestation statement")?;
        let result = (format.verify)(&statement, object.auth_data(), client_data_hash)
            .context(format!("{} verifier", format.id))?;
        debug!(
            format = format.id,
            attestation_type = %result.attestation_type(),
            "Attestation statement verified"
        );
        Ok((statement, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_builtin_formats() {
        let registry = AttestationFormatRegistry::new();
        assert_eq!(
            registry.format_ids(),
            vec!["android-key", "fido-u2f", "none", "packed"]
        );
        assert!(registry.get("android-key").is_ok());
    }

    #[test]
    fn test_unknown_format_is_unsupported() {
        let registry = AttestationFormatRegistry::new();
        let err = registry.get("tpm").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnsupportedFeature);
        assert!(AttestationFormatRegistry::empty().get("none").is_err());
    }
}
