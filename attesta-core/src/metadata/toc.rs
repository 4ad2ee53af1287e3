use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthenticatorIdentifier;
use crate::bytes::ByteBuffer;
use crate::error::{AttestaError, Result};

/// Certification or security status of an authenticator model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticatorStatus {
    #[serde(rename = "NOT_FIDO_CERTIFIED")]
    NotFidoCertified,
    #[serde(rename = "FIDO_CERTIFIED")]
    FidoCertified,
    #[serde(rename = "USER_VERIFICATION_BYPASS")]
    UserVerificationBypass,
    #[serde(rename = "ATTESTATION_KEY_COMPROMISE")]
    AttestationKeyCompromise,
    #[serde(rename = "USER_KEY_REMOTE_COMPROMISE")]
    UserKeyRemoteCompromise,
    #[serde(rename = "USER_KEY_PHYSICAL_COMPROMISE")]
    UserKeyPhysicalCompromise,
    #[serde(rename = "UPDATE_AVAILABLE")]
    UpdateAvailable,
    #[serde(rename = "REVOKED")]
    Revoked,
    #[serde(rename = "SELF_ASSERTION_SUBMITTED")]
    SelfAssertionSubmitted,
    #[serde(rename = "FIDO_CERTIFIED_L1")]
    FidoCertifiedL1,
    #[serde(rename = "FIDO_CERTIFIED_L1plus")]
    FidoCertifiedL1Plus,
    #[serde(rename = "FIDO_CERTIFIED_L2")]
    FidoCertifiedL2,
    #[serde(rename = "FIDO_CERTIFIED_L2plus")]
    FidoCertifiedL2Plus,
    #[serde(rename = "FIDO_CERTIFIED_L3")]
    FidoCertifiedL3,
    #[serde(rename = "FIDO_CERTIFIED_L3plus")]
    FidoCertifiedL3Plus,
    /// A status this library does not know yet.
    #[serde(other)]
    Unknown,
}

impl AuthenticatorStatus {
    /// Keys of this model can no longer be assumed to be protected.
    pub fn is_compromise(self) -> bool {
        matches!(
            self,
            Self::AttestationKeyCompromise
                | Self::UserKeyRemoteCompromise
                | Self::UserKeyPhysicalCompromise
                | Self::UserVerificationBypass
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: AuthenticatorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
    /// Base64 DER; for compromise reports, the affected attestation certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification_descriptor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification_policy_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification_requirements_version: Option<String>,
}

/// One authenticator model listed in the TOC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attestation_certificate_key_identifiers: Vec<String>,
    /// Metadata statement download location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64url SHA-256 of the statement as downloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub status_reports: Vec<StatusReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_last_status_change: Option<NaiveDate>,
}

impl TocEntry {
    pub fn matches(&self, identifier: &AuthenticatorIdentifier) -> bool {
        match identifier {
            AuthenticatorIdentifier::Aaguid(aaguid) => self.aaguid.as_ref() == Some(aaguid),
            AuthenticatorIdentifier::Aaid(aaid) => self.aaid.as_deref() == Some(aaid.as_str()),
            AuthenticatorIdentifier::KeyIdentifier(key_id) => self
                .attestation_certificate_key_identifiers
                .iter()
                .any(|k| k.eq_ignore_ascii_case(key_id)),
        }
    }

    /// Decoded [`hash`](Self::hash), `None` when the entry has no statement.
    pub fn hash_bytes(&self) -> Result<Option<ByteBuffer>> {
        self.hash
            .as_deref()
            .map(|h| {
                ByteBuffer::from_base64url(h)
                    .map_err(|e| AttestaError::Parse(format!("Invalid TOC entry hash: {e}")))
            })
            .transpose()
    }
}

/// Claims of the signed metadata TOC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataToc {
    /// Serial number, increases with every release.
    pub no: u64,
    pub next_update: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_header: Option<String>,
    #[serde(default)]
    pub entries: Vec<TocEntry>,
}

impl MetadataToc {
    pub fn find_entry(&self, identifier: &AuthenticatorIdentifier) -> Option<&TocEntry> {
        self.entries.iter().find(|entry| entry.matches(identifier))
    }

    /// Start of the `nextUpdate` day in UTC; the TOC is stale from then on.
    pub fn next_update_at(&self) -> DateTime<Utc> {
        self.next_update.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.next_update_at()
    }
}
