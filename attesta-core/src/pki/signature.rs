use openssl::hash::MessageDigest;
use openssl::pkey::{Id, PKeyRef, Public};
use openssl::rsa::Padding;
use openssl::sign::{RsaPssSaltlen, Verifier};
use tracing::debug;

use crate::cose::CoseAlgorithm;
use crate::error::{AttestaError, Result};

fn digest_for(algorithm: CoseAlgorithm) -> Result<Option<MessageDigest>> {
    match algorithm {
        CoseAlgorithm::Es256 | CoseAlgorithm::Rs256 | CoseAlgorithm::Ps256 => {
            Ok(Some(MessageDigest::sha256()))
        }
        CoseAlgorithm::Es384 | CoseAlgorithm::Rs384 | CoseAlgorithm::Ps384 => {
            Ok(Some(MessageDigest::sha384()))
        }
        CoseAlgorithm::Es512 | CoseAlgorithm::Rs512 | CoseAlgorithm::Ps512 => {
            Ok(Some(MessageDigest::sha512()))
        }
        CoseAlgorithm::Rs1 => Ok(Some(MessageDigest::sha1())),
        CoseAlgorithm::EdDsa => Ok(None),
        CoseAlgorithm::Other(id) => Err(AttestaError::UnsupportedAlgorithm(id)),
    }
}

fn key_fits(algorithm: CoseAlgorithm, key: &PKeyRef<Public>) -> bool {
    match algorithm {
        a if a.is_ecdsa() => key.id() == Id::EC,
        a if a.is_rsa() => key.id() == Id::RSA,
        CoseAlgorithm::EdDsa => key.id() == Id::ED25519,
        _ => false,
    }
}

/// Verify `signature` over `message` with a COSE-identified algorithm.
///
/// Returns `Ok(false)` for a wrong or malformed signature, or a key that does
/// not fit the algorithm. Unknown algorithms are an error.
pub fn verify_signature(
    algorithm: CoseAlgorithm,
    key: &PKeyRef<Public>,
    message: &[u8],
    signature: &[u8],
) -> Result<bool> {
    let digest = digest_for(algorithm)?;
    if !key_fits(algorithm, key) {
        debug!(%algorithm, key_type = key.id().as_raw(), "Key type does not match signature algorithm");
        return Ok(false);
    }

    let mut verifier = match digest {
        Some(md) => Verifier::new(md, key)?,
        None => Verifier::new_without_digest(key)?,
    };
    if matches!(
        algorithm,
        CoseAlgorithm::Ps256 | CoseAlgorithm::Ps384 | CoseAlgorithm::Ps512
    ) {
        verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
        verifier.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
    }

    let outcome = if digest.is_some() {
        verifier.update(message)?;
        verifier.verify(signature)
    } else {
        verifier.verify_oneshot(signature, message)
    };

    match outcome {
        Ok(valid) => Ok(valid),
        Err(e) => {
            debug!(%algorithm, error = %e, "Signature could not be checked");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::sign::Signer;

    fn public_of(key: &PKey<Private>) -> PKey<Public> {
        PKey::public_key_from_der(&key.public_key_to_der().unwrap()).unwrap()
    }

    fn ec_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    #[test]
    fn test_es256() {
        let key = ec_key();
        let mut signer = Signer::new(MessageDigest::sha256(), &key).unwrap();
        signer.update(b"message").unwrap();
        let sig = signer.sign_to_vec().unwrap();

        let public = public_of(&key);
        assert!(verify_signature(CoseAlgorithm::Es256, &public, b"message", &sig).unwrap());
        assert!(!verify_signature(CoseAlgorithm::Es256, &public, b"other", &sig).unwrap());
        assert!(!verify_signature(CoseAlgorithm::Es256, &public, b"message", b"junk").unwrap());
        assert!(!verify_signature(CoseAlgorithm::Rs256, &public, b"message", &sig).unwrap());
    }

    #[test]
    fn test_rs256_and_ps256() {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let public = public_of(&key);

        let mut signer = Signer::new(MessageDigest::sha256(), &key).unwrap();
        signer.update(b"message").unwrap();
        let sig = signer.sign_to_vec().unwrap();
        assert!(verify_signature(CoseAlgorithm::Rs256, &public, b"message", &sig).unwrap());

        let mut signer = Signer::new(MessageDigest::sha256(), &key).unwrap();
        signer.set_rsa_padding(Padding::PKCS1_PSS).unwrap();
        signer.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH).unwrap();
        signer.update(b"message").unwrap();
        let sig = signer.sign_to_vec().unwrap();
        assert!(verify_signature(CoseAlgorithm::Ps256, &public, b"message", &sig).unwrap());
    }

    #[test]
    fn test_eddsa() {
        let key = PKey::generate_ed25519().unwrap();
        let mut signer = Signer::new_without_digest(&key).unwrap();
        let sig = signer.sign_oneshot_to_vec(b"message").unwrap();

        let public = public_of(&key);
        assert!(verify_signature(CoseAlgorithm::EdDsa, &public, b"message", &sig).unwrap());
        assert!(!verify_signature(CoseAlgorithm::EdDsa, &public, b"other", &sig).unwrap());
    }

    #[test]
    fn test_unknown_algorithm_is_error() {
        let public = public_of(&ec_key());
        let err = verify_signature(CoseAlgorithm::Other(-999), &public, b"m", b"s").unwrap_err();
        assert!(matches!(err, AttestaError::UnsupportedAlgorithm(-999)));
    }
}
