use std::cmp::Ordering;
use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use openssl::pkey::{PKey, Public};
use openssl::x509::{X509, X509NameRef, X509Ref};
use x509_parser::der_parser::der::parse_der;
use x509_parser::prelude::{parse_x509_certificate, X509Certificate};

use crate::error::{AttestaError, Result};

/// An X.509 certificate kept alongside its original DER encoding.
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
    der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let x509 = X509::from_der(der)
            .map_err(|e| AttestaError::Certificate(format!("invalid DER certificate: {e}")))?;
        Ok(Self {
            x509,
            der: der.to_vec(),
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let x509 = X509::from_pem(pem.as_bytes())
            .map_err(|e| AttestaError::Certificate(format!("invalid PEM certificate: {e}")))?;
        let der = x509.to_der()?;
        Ok(Self { x509, der })
    }

    /// Accepts either a PEM block or bare base64 DER, as found in metadata statements.
    pub fn from_pem_or_base64(text: &str) -> Result<Self> {
        if text.contains("-----BEGIN") {
            return Self::from_pem(text);
        }
        let der = STANDARD
            .decode(text.trim())
            .map_err(|e| AttestaError::Certificate(format!("invalid base64 certificate: {e}")))?;
        Self::from_der(&der)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> String {
        der_to_pem(&self.der)
    }

    pub fn x509(&self) -> &X509Ref {
        &self.x509
    }

    pub fn public_key(&self) -> Result<PKey<Public>> {
        Ok(self.x509.public_key()?)
    }

    pub fn subject(&self) -> String {
        name_to_string(self.x509.subject_name())
    }

    pub fn issuer(&self) -> String {
        name_to_string(self.x509.issuer_name())
    }

    /// Subject and issuer names are identical, compared entry by entry.
    pub fn is_self_issued(&self) -> bool {
        self.x509
            .subject_name()
            .try_cmp(self.x509.issuer_name())
            .map(|order| order == Ordering::Equal)
            .unwrap_or(false)
    }

    fn parsed(&self) -> Result<X509Certificate<'_>> {
        parse_x509_certificate(&self.der)
            .map(|(_, cert)| cert)
            .map_err(|e| AttestaError::Certificate(format!("unparseable certificate: {e}")))
    }

    /// Basic constraints `cA` flag. Certificates without the extension are not CAs.
    pub fn is_ca(&self) -> Result<bool> {
        let cert = self.parsed()?;
        let constraints = cert
            .basic_constraints()
            .map_err(|e| AttestaError::Certificate(format!("bad basic constraints: {e}")))?;
        Ok(constraints.map(|ext| ext.value.ca).unwrap_or(false))
    }

    /// Raw `extnValue` contents of the extension with the given dotted OID.
    pub fn extension_value(&self, oid: &str) -> Result<Option<Vec<u8>>> {
        let cert = self.parsed()?;
        Ok(cert
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == oid)
            .map(|ext| ext.value.to_vec()))
    }

    /// Extension value that is itself a DER OCTET STRING, unwrapped.
    pub fn octet_string_extension(&self, oid: &str) -> Result<Option<Vec<u8>>> {
        let Some(value) = self.extension_value(oid)? else {
            return Ok(None);
        };
        let (_, obj) = parse_der(&value)
            .map_err(|e| AttestaError::Parse(format!("extension {oid} is not DER: {e}")))?;
        let bytes = obj
            .as_slice()
            .map_err(|e| AttestaError::Parse(format!("extension {oid} is not an OCTET STRING: {e}")))?;
        Ok(Some(bytes.to_vec()))
    }

    /// Hex SHA-1 of the subjectPublicKey bits, the FIDO attestation
    /// certificate key identifier.
    pub fn key_identifier(&self) -> Result<String> {
        let cert = self.parsed()?;
        let bits = &cert.public_key().subject_public_key.data;
        Ok(hex::encode(openssl::sha::sha1(bits)))
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject())
            .field("issuer", &self.issuer())
            .finish()
    }
}

fn name_to_string(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = String::from_utf8_lossy(entry.data().as_slice());
            format!("{key}={value}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Wrap a DER certificate in a PEM block with 64-column base64 lines.
pub fn der_to_pem(der: &[u8]) -> String {
    let b64 = STANDARD.encode(der);
    let mut pem = String::with_capacity(b64.len() + b64.len() / 64 + 64);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    for chunk in b64.as_bytes().chunks(64) {
        // base64 output is ASCII
        pem.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}
