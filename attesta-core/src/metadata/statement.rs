use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::toc::{AuthenticatorStatus, StatusReport};
use crate::bytes::ByteBuffer;
use crate::error::{AttestaError, Result};
use crate::pki::Certificate;

/// Metadata statement of an authenticator model, as published by the metadata service.
///
/// Only the fields relevant to attestation trust are typed; everything else
/// is kept in [`other`](Self::other).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataStatement {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attestation_certificate_key_identifiers: Vec<String>,
    #[serde(default)]
    pub authenticator_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_family: Option<String>,
    /// `ATTESTATION_*` constants from the FIDO registry.
    #[serde(default)]
    pub attestation_types: Vec<u16>,
    /// Base64 DER (or PEM) trust anchors for this model's attestation chains.
    #[serde(default)]
    pub attestation_root_certificates: Vec<String>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
    /// Copied from the TOC entry; not part of the downloaded document.
    #[serde(skip)]
    pub status_reports: Vec<StatusReport>,
}

impl MetadataStatement {
    /// Decode a statement as served by the metadata service: base64url-encoded JSON.
    pub fn from_base64url(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| AttestaError::Parse("Metadata statement is not base64url text".into()))?;
        let json = ByteBuffer::from_base64url(text.trim())
            .map_err(|e| AttestaError::Parse(format!("Metadata statement: {e}")))?;
        Self::from_json(json.as_slice())
    }

    pub fn from_json(json: &[u8]) -> Result<Self> {
        serde_json::from_slice(json)
            .map_err(|e| AttestaError::Parse(format!("Invalid metadata statement JSON: {e}")))
    }

    pub fn with_status_reports(mut self, reports: Vec<StatusReport>) -> Self {
        self.status_reports = reports;
        self
    }

    /// The most recent status report; reports are listed oldest first.
    pub fn current_status(&self) -> Option<AuthenticatorStatus> {
        self.status_reports.last().map(|report| report.status)
    }

    pub fn is_revoked(&self) -> bool {
        self.status_reports
            .iter()
            .any(|report| report.status == AuthenticatorStatus::Revoked)
    }

    pub fn is_compromised(&self) -> bool {
        self.status_reports
            .iter()
            .any(|report| report.status.is_compromise())
    }

    /// Parsed root certificates. Entries that fail to parse are skipped.
    pub fn trust_anchors(&self) -> Vec<Certificate> {
        self.attestation_root_certificates
            .iter()
            .filter_map(|text| match Certificate::from_pem_or_base64(text) {
                Ok(cert) => Some(cert),
                Err(e) => {
                    warn!(error = %e, description = %self.description, "Skipping unreadable root certificate");
                    None
                }
            })
            .collect()
    }
}
