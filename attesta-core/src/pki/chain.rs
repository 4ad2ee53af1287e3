use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use openssl::asn1::Asn1Time;
use openssl::error::ErrorStack;
use openssl::x509::X509VerifyResult;
use tracing::{debug, warn};

use super::Certificate;
use crate::clock::{Clock, ManualClock, SystemClock};

/// Decides whether a certificate chain terminates at a trusted root.
///
/// Implementations answer with a plain yes/no: every way a chain can fail
/// (bad signature, wrong issuer, expired, foreign root) is "not trusted".
pub trait ChainValidator: Send + Sync {
    /// `chain` is leaf first. It may end with a copy of `root`, which must
    /// then be byte-identical to it. A chain holding only that copy is
    /// trusted as a pinned certificate.
    fn validate_chain(&self, root: &Certificate, chain: &[Certificate]) -> bool;
}

/// OpenSSL-backed path validation against a single pinned root.
#[derive(Debug, Clone)]
pub struct X509ChainValidator {
    clock: Arc<dyn Clock>,
}

impl Default for X509ChainValidator {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl X509ChainValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validity periods are checked against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Check validity periods at a fixed instant instead of the current time.
    pub fn at_time(at: DateTime<Utc>) -> Self {
        Self::with_clock(Arc::new(ManualClock::new(at)))
    }

    fn check(&self, root: &Certificate, chain: &[Certificate]) -> Result<bool, ErrorStack> {
        let mut path: Vec<&Certificate> = chain.iter().collect();

        // A trailing copy of the pinned anchor is dropped; any other
        // self-issued certificate at the end is a foreign root.
        if let Some(last) = path.last() {
            if *last == root {
                path.pop();
            } else if last.is_self_issued() {
                debug!(subject = %last.subject(), "Chain ends in a root that is not the trust anchor");
                return Ok(false);
            }
        }

        let now = Asn1Time::from_unix(self.clock.now().timestamp())?;
        if !within_validity(root, &now)? {
            debug!(subject = %root.subject(), "Trust anchor outside its validity period");
            return Ok(false);
        }

        for (i, cert) in path.iter().enumerate() {
            let issuer = path.get(i + 1).copied().unwrap_or(root);

            if issuer.x509().issued(cert.x509()) != X509VerifyResult::OK {
                debug!(subject = %cert.subject(), issuer = %issuer.subject(), "Issuer does not match");
                return Ok(false);
            }
            let issuer_key = issuer.x509().public_key()?;
            if !cert.x509().verify(&issuer_key)? {
                debug!(subject = %cert.subject(), "Certificate signature invalid");
                return Ok(false);
            }
            if !within_validity(cert, &now)? {
                debug!(subject = %cert.subject(), "Certificate outside its validity period");
                return Ok(false);
            }
            if i + 1 < path.len() && !issuer.is_ca().unwrap_or(false) {
                debug!(subject = %issuer.subject(), "Intermediate is not a CA");
                return Ok(false);
            }
        }

        Ok(true)
    }
}

impl ChainValidator for X509ChainValidator {
    fn validate_chain(&self, root: &Certificate, chain: &[Certificate]) -> bool {
        if chain.is_empty() {
            return false;
        }
        match self.check(root, chain) {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "Chain validation aborted");
                false
            }
        }
    }
}

fn within_validity(cert: &Certificate, now: &Asn1Time) -> Result<bool, ErrorStack> {
    let starts = cert.x509().not_before().compare(now)?;
    let ends = cert.x509().not_after().compare(now)?;
    Ok(starts != Ordering::Greater && ends != Ordering::Less)
}
