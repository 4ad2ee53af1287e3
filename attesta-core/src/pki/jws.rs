use base64::{engine::general_purpose::STANDARD, Engine};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;

use super::Certificate;
use crate::error::{AttestaError, Result};

/// Claims of a JWS whose signature checked out against its own `x5c` leaf.
///
/// The chain is NOT validated here: callers must still anchor `chain` to a
/// trusted root before believing the claims.
#[derive(Debug, Clone)]
pub struct VerifiedJws<T> {
    pub claims: T,
    pub algorithm: Algorithm,
    /// Leaf first, as listed in the header.
    pub chain: Vec<Certificate>,
}

/// Verify a compact JWS signed with the leaf key of its `x5c` header.
///
/// Only ECDSA and RSA algorithms are accepted.
pub fn verify_x5c_jws<T: DeserializeOwned>(token: &str) -> Result<VerifiedJws<T>> {
    let header = decode_header(token.trim())
        .map_err(|e| AttestaError::Parse(format!("Invalid JWT header: {e}")))?;

    let x5c = header
        .x5c
        .filter(|certs| !certs.is_empty())
        .ok_or_else(|| AttestaError::Parse("JWT header has no x5c certificate chain".into()))?;

    let chain = x5c
        .iter()
        .map(|b64| {
            let der = STANDARD.decode(b64).map_err(|e| {
                AttestaError::Certificate(format!("x5c entry is not base64: {e}"))
            })?;
            Certificate::from_der(&der)
        })
        .collect::<Result<Vec<_>>>()?;

    let leaf_pem = chain[0].public_key()?.public_key_to_pem()?;
    let decoding_key = match header.alg {
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(&leaf_pem),
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(&leaf_pem),
        other => {
            return Err(AttestaError::TrustResolution(format!(
                "JWT algorithm {other:?} is not accepted"
            )))
        }
    }
    .map_err(|e| AttestaError::TrustResolution(format!("Unusable x5c leaf key: {e}")))?;

    let mut validation = Validation::new(header.alg);
    // Freshness comes from the payload (nextUpdate), not from registered claims.
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<T>(token.trim(), &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                AttestaError::TrustResolution("Invalid JWT signature".into())
            }
            jsonwebtoken::errors::ErrorKind::Json(_) => {
                AttestaError::Parse(format!("JWT payload has unexpected shape: {e}"))
            }
            _ => AttestaError::TrustResolution(format!("Failed to verify JWT: {e}")),
        }
    })?;

    Ok(VerifiedJws {
        claims: data.claims,
        algorithm: header.alg,
        chain,
    })
}
