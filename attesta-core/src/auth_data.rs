//! Authenticator data as produced by the authenticator during registration.
//!
//! Layout: `rpIdHash(32) | flags(1) | signCount(4)`, then attested credential
//! data when the AT flag is set, then a CBOR extensions map when ED is set.

use uuid::Uuid;

use crate::bytes::ByteBuffer;
use crate::cbor::{self, CborMap, CborValue, DecodeOptions};
use crate::cose::CoseKey;
use crate::error::{AttestaError, Result, ResultExt};

const RP_ID_HASH_LEN: usize = 32;
const FLAGS_OFFSET: usize = 32;
const SIGN_COUNT_OFFSET: usize = 33;
const CREDENTIAL_DATA_OFFSET: usize = 37;
const AAGUID_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorFlags(u8);

impl AuthenticatorFlags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn user_present(self) -> bool {
        self.0 & Self::USER_PRESENT != 0
    }

    pub fn user_verified(self) -> bool {
        self.0 & Self::USER_VERIFIED != 0
    }

    pub fn has_attested_credential_data(self) -> bool {
        self.0 & Self::ATTESTED_CREDENTIAL_DATA != 0
    }

    pub fn has_extension_data(self) -> bool {
        self.0 & Self::EXTENSION_DATA != 0
    }
}

#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    pub aaguid: Uuid,
    pub credential_id: ByteBuffer,
    pub public_key: CoseKey,
}

#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    raw: ByteBuffer,
    rp_id_hash: [u8; RP_ID_HASH_LEN],
    flags: AuthenticatorFlags,
    sign_count: u32,
    attested_credential: Option<AttestedCredentialData>,
    extensions: Option<CborMap>,
}

impl AuthenticatorData {
    pub fn parse(raw: ByteBuffer) -> Result<Self> {
        let mut rp_id_hash = [0u8; RP_ID_HASH_LEN];
        rp_id_hash.copy_from_slice(raw.bytes_at(0, RP_ID_HASH_LEN).context("rpIdHash")?);
        let flags = AuthenticatorFlags(raw.byte_at(FLAGS_OFFSET).context("flags")?);
        let sign_count = raw.u32_at(SIGN_COUNT_OFFSET).context("signCount")?;

        let mut offset = CREDENTIAL_DATA_OFFSET;
        let attested_credential = if flags.has_attested_credential_data() {
            let aaguid = Uuid::from_slice(raw.bytes_at(offset, AAGUID_LEN).context("aaguid")?)
                .map_err(|e| AttestaError::Parse(format!("invalid AAGUID: {e}")))?;
            offset += AAGUID_LEN;

            let id_len = usize::from(raw.u16_at(offset).context("credentialIdLength")?);
            offset += 2;
            let credential_id = raw.sub_buffer(offset, id_len).context("credentialId")?;
            offset += id_len;

            let (key, next) = cbor::decode_in_place_with(&raw, offset, DecodeOptions::strict())
                .context("credentialPublicKey")?;
            offset = next;
            let key_map = match key {
                CborValue::Map(map) => map,
                other => {
                    return Err(AttestaError::Parse(format!(
                        "credential public key must be a map, got {}",
                        other.type_name()
                    )))
                }
            };
            let public_key = CoseKey::from_cbor(&key_map).context("credentialPublicKey")?;

            Some(AttestedCredentialData {
                aaguid,
                credential_id,
                public_key,
            })
        } else {
            None
        };

        let extensions = if flags.has_extension_data() {
            let (ext, next) = cbor::decode_in_place_with(&raw, offset, DecodeOptions::strict())
                .context("extensions")?;
            offset = next;
            match ext {
                CborValue::Map(map) => Some(map),
                other => {
                    return Err(AttestaError::Parse(format!(
                        "extensions must be a map, got {}",
                        other.type_name()
                    )))
                }
            }
        } else {
            None
        };

        if offset != raw.len() {
            return Err(AttestaError::Parse(format!(
                "{} unexpected trailing bytes in authenticator data",
                raw.len() - offset
            )));
        }

        Ok(Self {
            raw,
            rp_id_hash,
            flags,
            sign_count,
            attested_credential,
            extensions,
        })
    }

    pub fn raw(&self) -> &ByteBuffer {
        &self.raw
    }

    pub fn rp_id_hash(&self) -> &[u8; RP_ID_HASH_LEN] {
        &self.rp_id_hash
    }

    pub fn flags(&self) -> AuthenticatorFlags {
        self.flags
    }

    pub fn sign_count(&self) -> u32 {
        self.sign_count
    }

    pub fn attested_credential(&self) -> Option<&AttestedCredentialData> {
        self.attested_credential.as_ref()
    }

    /// Attested credential data, required during registration.
    pub fn require_attested_credential(&self) -> Result<&AttestedCredentialData> {
        self.attested_credential.as_ref().ok_or_else(|| {
            AttestaError::Parse("authenticator data has no attested credential data".into())
        })
    }

    pub fn extensions(&self) -> Option<&CborMap> {
        self.extensions.as_ref()
    }
}
