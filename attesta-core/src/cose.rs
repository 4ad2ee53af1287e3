//! COSE algorithm identifiers and public keys (RFC 8152) as they appear in
//! WebAuthn credential data.

use std::fmt;

use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, PKeyRef, Public};
use openssl::rsa::Rsa;

use crate::cbor::{CborMap, CborValue};
use crate::error::{AttestaError, Result};

const KEY_TYPE: i64 = 1;
const KEY_ALG: i64 = 3;

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

const EC2_CRV: i64 = -1;
const EC2_X: i64 = -2;
const EC2_Y: i64 = -3;
const RSA_N: i64 = -1;
const RSA_E: i64 = -2;
const OKP_CRV: i64 = -1;
const OKP_X: i64 = -2;

const CRV_ED25519: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseAlgorithm {
    Es256,
    EdDsa,
    Es384,
    Es512,
    Ps256,
    Ps384,
    Ps512,
    Rs256,
    Rs384,
    Rs512,
    Rs1,
    Other(i64),
}

impl CoseAlgorithm {
    pub fn from_id(id: i64) -> Self {
        match id {
            -7 => Self::Es256,
            -8 => Self::EdDsa,
            -35 => Self::Es384,
            -36 => Self::Es512,
            -37 => Self::Ps256,
            -38 => Self::Ps384,
            -39 => Self::Ps512,
            -257 => Self::Rs256,
            -258 => Self::Rs384,
            -259 => Self::Rs512,
            -65535 => Self::Rs1,
            other => Self::Other(other),
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::EdDsa => -8,
            Self::Es384 => -35,
            Self::Es512 => -36,
            Self::Ps256 => -37,
            Self::Ps384 => -38,
            Self::Ps512 => -39,
            Self::Rs256 => -257,
            Self::Rs384 => -258,
            Self::Rs512 => -259,
            Self::Rs1 => -65535,
            Self::Other(id) => id,
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Other(_))
    }

    pub fn is_ecdsa(self) -> bool {
        matches!(self, Self::Es256 | Self::Es384 | Self::Es512)
    }

    pub fn is_rsa(self) -> bool {
        matches!(
            self,
            Self::Rs256
                | Self::Rs384
                | Self::Rs512
                | Self::Rs1
                | Self::Ps256
                | Self::Ps384
                | Self::Ps512
        )
    }
}

impl From<i64> for CoseAlgorithm {
    fn from(id: i64) -> Self {
        Self::from_id(id)
    }
}

impl fmt::Display for CoseAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Es256 => f.write_str("ES256"),
            Self::EdDsa => f.write_str("EdDSA"),
            Self::Es384 => f.write_str("ES384"),
            Self::Es512 => f.write_str("ES512"),
            Self::Ps256 => f.write_str("PS256"),
            Self::Ps384 => f.write_str("PS384"),
            Self::Ps512 => f.write_str("PS512"),
            Self::Rs256 => f.write_str("RS256"),
            Self::Rs384 => f.write_str("RS384"),
            Self::Rs512 => f.write_str("RS512"),
            Self::Rs1 => f.write_str("RS1"),
            Self::Other(id) => write!(f, "COSE({id})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    fn from_id(id: i64) -> Result<Self> {
        match id {
            1 => Ok(Self::P256),
            2 => Ok(Self::P384),
            3 => Ok(Self::P521),
            other => Err(AttestaError::UnsupportedKey(format!(
                "unsupported EC2 curve {other}"
            ))),
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::P256 => 1,
            Self::P384 => 2,
            Self::P521 => 3,
        }
    }

    /// Length in bytes of one affine coordinate.
    pub fn coordinate_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    fn nid(self) -> Nid {
        match self {
            Self::P256 => Nid::X9_62_PRIME256V1,
            Self::P384 => Nid::SECP384R1,
            Self::P521 => Nid::SECP521R1,
        }
    }
}

/// A credential public key decoded from its COSE_Key map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKey {
    Ec2 {
        algorithm: Option<CoseAlgorithm>,
        curve: EcCurve,
        x: Vec<u8>,
        y: Vec<u8>,
    },
    Rsa {
        algorithm: Option<CoseAlgorithm>,
        n: Vec<u8>,
        e: Vec<u8>,
    },
    /// Ed25519 only.
    Okp {
        algorithm: Option<CoseAlgorithm>,
        x: Vec<u8>,
    },
}

impl CoseKey {
    pub fn from_cbor(map: &CborMap) -> Result<Self> {
        let kty = int_field(map, KEY_TYPE, "kty")?
            .ok_or_else(|| AttestaError::Parse("COSE key is missing kty".into()))?;
        let algorithm = int_field(map, KEY_ALG, "alg")?.map(CoseAlgorithm::from_id);

        match kty {
            KTY_EC2 => {
                let crv = int_field(map, EC2_CRV, "crv")?
                    .ok_or_else(|| AttestaError::Parse("EC2 key is missing crv".into()))?;
                let curve = EcCurve::from_id(crv)?;
                let x = bytes_field(map, EC2_X, "x")?;
                let y = bytes_field(map, EC2_Y, "y")?;
                if x.len() != curve.coordinate_len() || y.len() != curve.coordinate_len() {
                    return Err(AttestaError::Parse(format!(
                        "EC2 coordinates must be {} bytes",
                        curve.coordinate_len()
                    )));
                }
                Ok(Self::Ec2 {
                    algorithm,
                    curve,
                    x,
                    y,
                })
            }
            KTY_RSA => Ok(Self::Rsa {
                algorithm,
                n: bytes_field(map, RSA_N, "n")?,
                e: bytes_field(map, RSA_E, "e")?,
            }),
            KTY_OKP => {
                let crv = int_field(map, OKP_CRV, "crv")?;
                if crv != Some(CRV_ED25519) {
                    return Err(AttestaError::UnsupportedKey(format!(
                        "unsupported OKP curve {crv:?}"
                    )));
                }
                let x = bytes_field(map, OKP_X, "x")?;
                if x.len() != 32 {
                    return Err(AttestaError::Parse("Ed25519 key must be 32 bytes".into()));
                }
                Ok(Self::Okp { algorithm, x })
            }
            other => Err(AttestaError::UnsupportedKey(format!(
                "unsupported COSE key type {other}"
            ))),
        }
    }

    pub fn to_cbor(&self) -> CborMap {
        let mut map = CborMap::new();
        let algorithm = match self {
            Self::Ec2 {
                algorithm,
                curve,
                x,
                y,
            } => {
                map.insert(KEY_TYPE, CborValue::from(KTY_EC2));
                map.insert(EC2_CRV, CborValue::from(curve.id()));
                map.insert(EC2_X, CborValue::Bytes(x.clone().into()));
                map.insert(EC2_Y, CborValue::Bytes(y.clone().into()));
                algorithm
            }
            Self::Rsa { algorithm, n, e } => {
                map.insert(KEY_TYPE, CborValue::from(KTY_RSA));
                map.insert(RSA_N, CborValue::Bytes(n.clone().into()));
                map.insert(RSA_E, CborValue::Bytes(e.clone().into()));
                algorithm
            }
            Self::Okp { algorithm, x } => {
                map.insert(KEY_TYPE, CborValue::from(KTY_OKP));
                map.insert(OKP_CRV, CborValue::from(CRV_ED25519));
                map.insert(OKP_X, CborValue::Bytes(x.clone().into()));
                algorithm
            }
        };
        if let Some(alg) = algorithm {
            map.insert(KEY_ALG, CborValue::from(alg.id()));
        }
        map
    }

    pub fn algorithm(&self) -> Option<CoseAlgorithm> {
        match self {
            Self::Ec2 { algorithm, .. } | Self::Rsa { algorithm, .. } | Self::Okp { algorithm, .. } => {
                *algorithm
            }
        }
    }

    /// Uncompressed SEC1 point (`04 || x || y`) for EC2 keys.
    pub fn uncompressed_point(&self) -> Option<Vec<u8>> {
        match self {
            Self::Ec2 { x, y, .. } => {
                let mut point = Vec::with_capacity(1 + x.len() + y.len());
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                Some(point)
            }
            _ => None,
        }
    }

    pub fn to_public_key(&self) -> Result<PKey<Public>> {
        match self {
            Self::Ec2 { curve, x, y, .. } => {
                let group = EcGroup::from_curve_name(curve.nid())?;
                let x = BigNum::from_slice(x)?;
                let y = BigNum::from_slice(y)?;
                let key = EcKey::from_public_key_affine_coordinates(&group, &x, &y)
                    .map_err(|e| AttestaError::UnsupportedKey(format!("invalid EC point: {e}")))?;
                Ok(PKey::from_ec_key(key)?)
            }
            Self::Rsa { n, e, .. } => {
                let rsa = Rsa::from_public_components(BigNum::from_slice(n)?, BigNum::from_slice(e)?)?;
                Ok(PKey::from_rsa(rsa)?)
            }
            Self::Okp { x, .. } => Ok(PKey::public_key_from_raw_bytes(x, Id::ED25519)?),
        }
    }

    /// True when `key` is the same public key as this COSE key.
    pub fn matches_public_key(&self, key: &PKeyRef<Public>) -> Result<bool> {
        Ok(self.to_public_key()?.public_eq(key))
    }
}

fn int_field(map: &CborMap, label: i64, name: &str) -> Result<Option<i64>> {
    match map.get_int(label) {
        None => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| {
            AttestaError::Parse(format!(
                "COSE key field {name} must be an integer, got {}",
                value.type_name()
            ))
        }),
    }
}

fn bytes_field(map: &CborMap, label: i64, name: &str) -> Result<Vec<u8>> {
    match map.get_int(label) {
        Some(CborValue::Bytes(b)) => Ok(b.to_vec()),
        Some(other) => Err(AttestaError::Parse(format!(
            "COSE key field {name} must be a byte string, got {}",
            other.type_name()
        ))),
        None => Err(AttestaError::Parse(format!("COSE key is missing {name}"))),
    }
}
