//! Shared fixtures: runtime-generated certificates, keys and attestation objects.

#![allow(dead_code)]

use attesta_core::cbor::{encode_map, CborMap, CborValue};
use attesta_core::cose::{CoseAlgorithm, CoseKey, EcCurve};
use attesta_core::{ByteBuffer, Certificate};
use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::{BigNum, BigNumContext, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509Extension, X509NameBuilder, X509};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const RP_ID: &str = "example.com";
pub const ANDROID_KEY_OID: &str = "1.3.6.1.4.1.11129.2.1.17";
pub const FIDO_AAGUID_OID: &str = "1.3.6.1.4.1.45724.1.1.4";

/// `[600] EXPLICIT NULL`: the allApplications authorization.
pub const ALL_APPLICATIONS: &[u8] = &[0xbf, 0x84, 0x58, 0x02, 0x05, 0x00];

pub fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).expect("group");
    PKey::from_ec_key(EcKey::generate(&group).expect("generate")).expect("pkey")
}

/// A certificate together with the private key it certifies.
pub struct Issued {
    pub cert: X509,
    pub key: PKey<Private>,
}

impl Issued {
    pub fn certificate(&self) -> Certificate {
        Certificate::from_der(&self.cert.to_der().expect("der")).expect("certificate")
    }

    pub fn der(&self) -> Vec<u8> {
        self.cert.to_der().expect("der")
    }

    pub fn pem(&self) -> String {
        String::from_utf8(self.cert.to_pem().expect("pem")).expect("utf8")
    }
}

pub struct CertBuilder<'a> {
    common_name: &'a str,
    key: PKey<Private>,
    issuer: Option<&'a Issued>,
    ca: bool,
    not_before: Asn1Time,
    not_after: Asn1Time,
    extensions: Vec<X509Extension>,
}

impl<'a> CertBuilder<'a> {
    pub fn new(common_name: &'a str) -> Self {
        Self {
            common_name,
            key: ec_key(),
            issuer: None,
            ca: false,
            not_before: Asn1Time::days_from_now(0).expect("time"),
            not_after: Asn1Time::days_from_now(365).expect("time"),
            extensions: Vec::new(),
        }
    }

    pub fn key(mut self, key: PKey<Private>) -> Self {
        self.key = key;
        self
    }

    pub fn issued_by(mut self, issuer: &'a Issued) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn ca(mut self) -> Self {
        self.ca = true;
        self
    }

    /// Validity window as unix timestamps.
    pub fn validity(mut self, not_before: i64, not_after: i64) -> Self {
        self.not_before = Asn1Time::from_unix(not_before).expect("time");
        self.not_after = Asn1Time::from_unix(not_after).expect("time");
        self
    }

    pub fn extension(mut self, oid: &str, der_contents: &[u8]) -> Self {
        let oid = Asn1Object::from_str(oid).expect("oid");
        let contents = Asn1OctetString::new_from_bytes(der_contents).expect("octets");
        self.extensions
            .push(X509Extension::new_from_der(&oid, false, &contents).expect("extension"));
        self
    }

    pub fn build(self) -> Issued {
        let mut name = X509NameBuilder::new().expect("name");
        name.append_entry_by_text("O", "Attesta Test").expect("O");
        name.append_entry_by_text("CN", self.common_name).expect("CN");
        let name = name.build();

        let mut builder = X509Builder::new().expect("builder");
        builder.set_version(2).expect("version");
        let mut serial = BigNum::new().expect("bn");
        serial.rand(64, MsbOption::MAYBE_ZERO, false).expect("rand");
        builder
            .set_serial_number(&serial.to_asn1_integer().expect("serial"))
            .expect("serial");
        builder.set_subject_name(&name).expect("subject");
        match self.issuer {
            Some(issuer) => builder
                .set_issuer_name(issuer.cert.subject_name())
                .expect("issuer"),
            None => builder.set_issuer_name(&name).expect("issuer"),
        }
        builder.set_not_before(&self.not_before).expect("not before");
        builder.set_not_after(&self.not_after).expect("not after");
        builder.set_pubkey(&self.key).expect("pubkey");

        if self.ca {
            builder
                .append_extension(BasicConstraints::new().critical().ca().build().expect("bc"))
                .expect("bc");
            builder
                .append_extension(
                    KeyUsage::new()
                        .critical()
                        .key_cert_sign()
                        .crl_sign()
                        .build()
                        .expect("ku"),
                )
                .expect("ku");
        } else {
            builder
                .append_extension(BasicConstraints::new().build().expect("bc"))
                .expect("bc");
        }
        for extension in self.extensions {
            builder.append_extension(extension).expect("extension");
        }

        let signing_key = self.issuer.map(|i| &i.key).unwrap_or(&self.key);
        builder
            .sign(signing_key, MessageDigest::sha256())
            .expect("sign");

        Issued {
            cert: builder.build(),
            key: self.key,
        }
    }
}

/// Root CA, intermediate CA and the intermediate's signing helper.
pub struct Pki {
    pub root: Issued,
    pub intermediate: Issued,
}

impl Pki {
    pub fn new(name: &str) -> Self {
        let root = CertBuilder::new(&format!("{name} Root")).ca().build();
        let intermediate = CertBuilder::new(&format!("{name} Intermediate"))
            .ca()
            .issued_by(&root)
            .build();
        Self { root, intermediate }
    }
}

pub fn sign_es256(key: &PKey<Private>, message: &[u8]) -> Vec<u8> {
    let mut signer = Signer::new(MessageDigest::sha256(), key).expect("signer");
    signer.update(message).expect("update");
    signer.sign_to_vec().expect("sign")
}

pub fn cose_key(key: &PKey<Private>) -> CoseKey {
    let ec = key.ec_key().expect("ec key");
    let mut ctx = BigNumContext::new().expect("ctx");
    let mut x = BigNum::new().expect("x");
    let mut y = BigNum::new().expect("y");
    ec.public_key()
        .affine_coordinates(ec.group(), &mut x, &mut y, &mut ctx)
        .expect("coordinates");
    CoseKey::Ec2 {
        algorithm: Some(CoseAlgorithm::Es256),
        curve: EcCurve::P256,
        x: x.to_vec_padded(32).expect("x"),
        y: y.to_vec_padded(32).expect("y"),
    }
}

pub fn rp_id_hash() -> [u8; 32] {
    Sha256::digest(RP_ID.as_bytes()).into()
}

pub fn client_data_hash() -> [u8; 32] {
    Sha256::digest(br#"{"type":"webauthn.create","challenge":"dGVzdA"}"#).into()
}

/// Authenticator data with UP, UV and AT set.
pub fn auth_data(aaguid: Uuid, credential_id: &[u8], key: &CoseKey) -> Vec<u8> {
    let mut data = rp_id_hash().to_vec();
    data.push(0x45);
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(aaguid.as_bytes());
    data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
    data.extend_from_slice(credential_id);
    data.extend(encode_map(&key.to_cbor()));
    data
}

pub fn attestation_object(fmt: &str, statement: CborMap, auth_data: &[u8]) -> ByteBuffer {
    let mut map = CborMap::new();
    map.insert("fmt", CborValue::from(fmt));
    map.insert("attStmt", CborValue::Map(statement));
    map.insert("authData", CborValue::Bytes(ByteBuffer::new(auth_data)));
    ByteBuffer::new(encode_map(&map))
}

pub fn x5c(certs: &[&Issued]) -> CborValue {
    CborValue::Array(
        certs
            .iter()
            .map(|c| CborValue::Bytes(ByteBuffer::new(c.der())))
            .collect(),
    )
}

/// DER `KeyDescription` with the given challenge and raw authorization list contents.
pub fn key_description(challenge: &[u8], software: &[u8], tee: &[u8]) -> Vec<u8> {
    let mut body = vec![
        0x02, 0x01, 0x03, // attestationVersion
        0x0a, 0x01, 0x01, // attestationSecurityLevel
        0x02, 0x01, 0x04, // keymasterVersion
        0x0a, 0x01, 0x01, // keymasterSecurityLevel
    ];
    body.push(0x04);
    body.push(challenge.len() as u8);
    body.extend_from_slice(challenge);
    body.extend_from_slice(&[0x04, 0x00]); // uniqueId
    body.push(0x30);
    body.push(software.len() as u8);
    body.extend_from_slice(software);
    body.push(0x30);
    body.push(tee.len() as u8);
    body.extend_from_slice(tee);

    let mut der = vec![0x30, body.len() as u8];
    der.extend(body);
    der
}

/// DER OCTET STRING holding an AAGUID, as the FIDO AAGUID extension carries it.
pub fn aaguid_extension(aaguid: Uuid) -> Vec<u8> {
    let mut der = vec![0x04, 0x10];
    der.extend_from_slice(aaguid.as_bytes());
    der
}
