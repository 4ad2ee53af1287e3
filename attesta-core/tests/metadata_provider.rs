//! Metadata service lookups against an in-memory downloader and a TOC signed at runtime.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use attesta_core::cbor::{CborMap, CborValue};
use attesta_core::metadata::{AuthenticatorStatus, MetadataServiceConfig};
use attesta_core::{
    AttestaError, AttestationType, AuthenticatorIdentifier, ByteBuffer, DownloadedFile,
    Downloader, ErrorCategory, ManualClock, MemoryCachePool, MetadataLookup, MetadataProvider,
    MetadataServiceProvider, MetadataServiceSource, RegistrationVerifier,
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{Duration, TimeZone, Utc};
use common::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const TOC_URL: &str = "https://mds.example.com/toc";
const TOKEN: &str = "s3cret";
const AAGUID: &str = "cb69481e-8ff7-4039-93ec-0a2729a154a8";
const STATEMENT_URL: &str = "https://MDS.example.com/metadata/cb69481e";
const STATEMENT_URL_WITH_TOKEN: &str = "https://mds.example.com/metadata/cb69481e?token=s3cret";

fn aaguid() -> Uuid {
    Uuid::parse_str(AAGUID).unwrap()
}

fn identifier() -> AuthenticatorIdentifier {
    AuthenticatorIdentifier::Aaguid(aaguid())
}

#[derive(Default)]
struct MockDownloader {
    routes: Mutex<HashMap<String, DownloadedFile>>,
    requests: Mutex<Vec<String>>,
}

impl MockDownloader {
    fn serve(&self, url: &str, content_type: &str, data: impl Into<Vec<u8>>) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            DownloadedFile {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    fn count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|requested| requested.as_str() == url)
            .count()
    }

    fn total(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn download_file(&self, url: &str) -> attesta_core::Result<DownloadedFile> {
        self.requests.lock().unwrap().push(url.to_string());
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AttestaError::Fetch(format!("404 Not Found: {url}")))
    }
}

fn sign_toc(signer: &Issued, chain: &[&Issued], claims: &Value) -> String {
    let mut header = Header::new(Algorithm::ES256);
    header.x5c = Some(chain.iter().map(|c| STANDARD.encode(c.der())).collect());
    let key = EncodingKey::from_ec_pem(&signer.key.private_key_to_pem_pkcs8().unwrap()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

/// Base64url statement as served, and the TOC hash of it.
fn statement_document(statement: &Value) -> (String, String) {
    let data = URL_SAFE_NO_PAD.encode(serde_json::to_vec(statement).unwrap());
    let hash = URL_SAFE_NO_PAD.encode(Sha256::digest(data.as_bytes()));
    (data, hash)
}

struct Mds {
    root: Issued,
    signer: Issued,
    downloader: Arc<MockDownloader>,
    clock: Arc<ManualClock>,
    pool: Arc<MemoryCachePool>,
}

impl Mds {
    fn new() -> Self {
        let (not_before, not_after) = Self::validity();
        let root = CertBuilder::new("MDS Root")
            .ca()
            .validity(not_before, not_after)
            .build();
        let signer = CertBuilder::new("MDS Signer")
            .issued_by(&root)
            .validity(not_before, not_after)
            .build();
        Self::with_certificates(root, signer)
    }

    /// Covers both today and the fixture clock.
    fn validity() -> (i64, i64) {
        let not_before = (Utc::now() - Duration::days(1)).timestamp();
        let not_after = Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap().timestamp();
        (not_before, not_after)
    }

    fn with_certificates(root: Issued, signer: Issued) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2030, 1, 15, 12, 0, 0).unwrap(),
        ));
        Self {
            root,
            signer,
            downloader: Arc::new(MockDownloader::default()),
            pool: Arc::new(MemoryCachePool::with_clock(clock.clone())),
            clock,
        }
    }

    fn toc_url() -> String {
        format!("{TOC_URL}?token={TOKEN}")
    }

    fn publish_toc(&self, no: u64, entries: Value) {
        let claims = json!({
            "legalHeader": "Test metadata",
            "no": no,
            "nextUpdate": "2030-02-01",
            "entries": entries,
        });
        let token = sign_toc(&self.signer, &[&self.signer], &claims);
        self.downloader
            .serve(&Self::toc_url(), "application/jose", token);
    }

    /// Publishes a statement for [`AAGUID`] and a TOC entry pointing at it.
    fn publish_statement(&self, statement: &Value, status: &str) {
        let (data, hash) = statement_document(statement);
        self.downloader
            .serve(STATEMENT_URL_WITH_TOKEN, "application/octet-stream", data);
        self.publish_toc(
            1,
            json!([{
                "aaguid": AAGUID,
                "url": STATEMENT_URL,
                "hash": hash,
                "statusReports": [
                    {"status": "FIDO_CERTIFIED", "effectiveDate": "2019-01-01"},
                    {"status": status, "effectiveDate": "2020-01-01"}
                ],
                "timeOfLastStatusChange": "2020-01-01"
            }]),
        );
    }

    fn provider(&self) -> MetadataServiceProvider {
        let source =
            MetadataServiceSource::new(TOC_URL, self.root.pem()).with_access_token(TOKEN);
        MetadataServiceProvider::new(source, self.downloader.clone(), self.pool.clone())
            .unwrap()
            .with_clock(self.clock.clone())
    }
}

fn test_statement() -> Value {
    json!({
        "description": "Test Security Key",
        "aaguid": AAGUID,
        "authenticatorVersion": 2,
        "protocolFamily": "fido2",
        "attestationTypes": [15879],
        "attestationRootCertificates": [],
        "icon": "data:image/png;base64,AAAA"
    })
}

#[tokio::test]
async fn test_lookup_found_with_status_reports() {
    let mds = Mds::new();
    mds.publish_statement(&test_statement(), "FIDO_CERTIFIED_L1");

    let lookup = mds.provider().lookup(&identifier()).await.unwrap();
    let MetadataLookup::Found(statement) = lookup else {
        panic!("expected a statement, got {lookup:?}");
    };
    assert_eq!(statement.description, "Test Security Key");
    assert_eq!(statement.aaguid, Some(aaguid()));
    assert_eq!(statement.status_reports.len(), 2);
    assert_eq!(
        statement.current_status(),
        Some(AuthenticatorStatus::FidoCertifiedL1)
    );
    assert!(statement.other.contains_key("icon"));

    assert_eq!(mds.downloader.count(&Mds::toc_url()), 1);
    assert_eq!(mds.downloader.count(STATEMENT_URL_WITH_TOKEN), 1);
}

#[tokio::test]
async fn test_second_lookup_is_served_from_cache() {
    let mds = Mds::new();
    mds.publish_statement(&test_statement(), "FIDO_CERTIFIED");
    let provider = mds.provider();

    let first = provider.get_metadata(&identifier()).await.unwrap();
    let second = provider.get_metadata(&identifier()).await.unwrap();
    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(mds.downloader.total(), 2);

    // A second provider sharing the pool needs no downloads either.
    assert!(mds.provider().get_metadata(&identifier()).await.unwrap().is_some());
    assert_eq!(mds.downloader.total(), 2);
}

#[tokio::test]
async fn test_toc_is_refetched_after_next_update() {
    let mds = Mds::new();
    mds.publish_statement(&test_statement(), "FIDO_CERTIFIED");
    let provider = mds.provider().with_config(MetadataServiceConfig {
        statement_cache_ttl: std::time::Duration::from_secs(90 * 86_400),
        ..MetadataServiceConfig::default()
    });

    assert_eq!(provider.toc().await.unwrap().no, 1);

    mds.clock
        .set(Utc.with_ymd_and_hms(2030, 1, 31, 23, 59, 59).unwrap());
    assert_eq!(provider.toc().await.unwrap().no, 1);
    assert_eq!(mds.downloader.count(&Mds::toc_url()), 1);

    mds.publish_toc(2, json!([]));
    mds.clock.advance(Duration::seconds(1));
    assert_eq!(provider.toc().await.unwrap().no, 2);
    assert_eq!(mds.downloader.count(&Mds::toc_url()), 2);
}

#[tokio::test]
async fn test_statement_hash_mismatch() {
    let mds = Mds::new();
    mds.publish_statement(&test_statement(), "FIDO_CERTIFIED");
    let (tampered, _) = statement_document(&json!({"description": "Impostor"}));
    mds.downloader
        .serve(STATEMENT_URL_WITH_TOKEN, "application/octet-stream", tampered);
    let provider = mds.provider();

    let lookup = provider.lookup(&identifier()).await.unwrap();
    let MetadataLookup::HashMismatch { url, expected, actual } = lookup else {
        panic!("expected a hash mismatch, got {lookup:?}");
    };
    assert_eq!(url, STATEMENT_URL);
    assert_ne!(expected, actual);

    assert_eq!(provider.get_metadata(&identifier()).await.unwrap(), None);
    // Mismatching documents are never cached.
    assert_eq!(mds.downloader.count(STATEMENT_URL_WITH_TOKEN), 2);
}

#[tokio::test]
async fn test_unexpected_toc_content_type() {
    let mds = Mds::new();
    mds.publish_toc(1, json!([]));
    let token = mds.downloader.routes.lock().unwrap()[&Mds::toc_url()].data.clone();

    mds.downloader
        .serve(&Mds::toc_url(), "text/html; charset=utf-8", token.clone());
    let err = mds.provider().toc().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::TrustResolutionFailure);

    mds.downloader
        .serve(&Mds::toc_url(), "Application/JOSE; charset=utf-8", token);
    assert_eq!(mds.provider().toc().await.unwrap().no, 1);
}

#[tokio::test]
async fn test_toc_signed_under_another_root() {
    let mds = Mds::new();
    let rogue_root = CertBuilder::new("MDS Root").ca().build();
    let rogue_signer = CertBuilder::new("MDS Signer").issued_by(&rogue_root).build();
    let claims = json!({"no": 7, "nextUpdate": "2030-02-01", "entries": []});
    mds.downloader.serve(
        &Mds::toc_url(),
        "application/jose",
        sign_toc(&rogue_signer, &[&rogue_signer, &rogue_root], &claims),
    );

    let err = mds.provider().toc().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::TrustResolutionFailure);
    assert!(err.to_string().contains("x5c chain"), "{err}");
}

#[tokio::test]
async fn test_toc_chain_validity_follows_provider_clock() {
    let root = CertBuilder::new("MDS Root").ca().build();
    let signer = CertBuilder::new("MDS Signer").issued_by(&root).build();
    let mds = Mds::with_certificates(root, signer);
    mds.publish_toc(1, json!([]));

    // The signer expires within a year, long before the 2030 clock.
    let err = mds.provider().toc().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::TrustResolutionFailure);
    assert!(err.to_string().contains("x5c chain"), "{err}");

    mds.clock.set(Utc::now());
    assert_eq!(mds.provider().toc().await.unwrap().no, 1);
}

#[tokio::test]
async fn test_tampered_toc_payload() {
    let mds = Mds::new();
    mds.publish_toc(1, json!([]));
    let token = String::from_utf8(
        mds.downloader.routes.lock().unwrap()[&Mds::toc_url()].data.clone(),
    )
    .unwrap();

    let forged_claims = json!({"no": 99, "nextUpdate": "2099-01-01", "entries": []});
    let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
    let parts: Vec<&str> = token.split('.').collect();
    let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
    mds.downloader
        .serve(&Mds::toc_url(), "application/jose", forged);

    let err = mds.provider().toc().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::TrustResolutionFailure);
}

#[tokio::test]
async fn test_toc_download_failure() {
    let mds = Mds::new();
    let err = mds.provider().lookup(&identifier()).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::FetchFailure);
}

#[tokio::test]
async fn test_access_token_only_sent_to_metadata_host() {
    let mds = Mds::new();
    let provider = mds.provider();

    assert_eq!(provider.token_url(TOC_URL), Mds::toc_url());
    assert_eq!(provider.token_url(STATEMENT_URL), STATEMENT_URL_WITH_TOKEN);
    assert_eq!(
        provider.token_url("https://cdn.example.net/statement"),
        "https://cdn.example.net/statement"
    );
    assert_eq!(
        provider.token_url("https://mds.example.com.evil.test/x"),
        "https://mds.example.com.evil.test/x"
    );

    let (data, hash) = statement_document(&test_statement());
    mds.downloader
        .serve("https://cdn.example.net/statement", "application/octet-stream", data);
    mds.publish_toc(
        1,
        json!([{"aaguid": AAGUID, "url": "https://cdn.example.net/statement", "hash": hash}]),
    );
    assert!(provider.get_metadata(&identifier()).await.unwrap().is_some());
    assert_eq!(mds.downloader.count("https://cdn.example.net/statement"), 1);
}

#[tokio::test]
async fn test_not_listed_and_no_statement() {
    let mds = Mds::new();
    mds.publish_toc(
        1,
        json!([
            {"aaguid": AAGUID, "statusReports": [{"status": "FIDO_CERTIFIED"}]},
            {"attestationCertificateKeyIdentifiers": ["923881fe2f214ee465484371aeb72e97f5a58e0a"]}
        ]),
    );
    let provider = mds.provider();

    assert_eq!(
        provider.lookup(&identifier()).await.unwrap(),
        MetadataLookup::NoStatement
    );
    assert_eq!(
        provider
            .lookup(&AuthenticatorIdentifier::Aaguid(Uuid::from_u128(1)))
            .await
            .unwrap(),
        MetadataLookup::NotListed
    );
    assert_eq!(
        provider
            .lookup(&AuthenticatorIdentifier::key_identifier(
                "923881FE2F214EE465484371AEB72E97F5A58E0A"
            ))
            .await
            .unwrap(),
        MetadataLookup::NoStatement
    );
    assert_eq!(mds.downloader.total(), 1);
}

/// A packed registration whose chain stops below the root the metadata statement lists.
fn packed_registration(pki: &Pki) -> ByteBuffer {
    let leaf = CertBuilder::new("Packed Attestation")
        .issued_by(&pki.intermediate)
        .extension(FIDO_AAGUID_OID, &aaguid_extension(aaguid()))
        .build();

    let auth_data = auth_data(aaguid(), &[0x01, 0x02, 0x03, 0x04], &cose_key(&ec_key()));
    let mut message = auth_data.clone();
    message.extend_from_slice(&client_data_hash());

    let mut statement = CborMap::new();
    statement.insert("alg", CborValue::from(-7));
    statement.insert(
        "sig",
        CborValue::Bytes(ByteBuffer::new(sign_es256(&leaf.key, &message))),
    );
    statement.insert("x5c", x5c(&[&leaf, &pki.intermediate]));
    attestation_object("packed", statement, &auth_data)
}

#[tokio::test]
async fn test_registration_trusted_through_metadata() {
    let mds = Mds::new();
    let pki = Pki::new("Vendor");
    let mut statement = test_statement();
    statement["attestationRootCertificates"] = json!([STANDARD.encode(pki.root.der())]);
    mds.publish_statement(&statement, "FIDO_CERTIFIED_L1");

    let object = packed_registration(&pki);

    let untrusted = RegistrationVerifier::default()
        .verify(&object, &client_data_hash())
        .await
        .unwrap();
    assert!(!untrusted.trusted);

    let result = RegistrationVerifier::default()
        .with_metadata_provider(Arc::new(mds.provider()))
        .verify(&object, &client_data_hash())
        .await
        .unwrap();
    assert_eq!(
        result.verification_result.attestation_type(),
        AttestationType::Basic
    );
    assert!(result.trusted);
    assert_eq!(
        result.metadata.map(|m| m.description),
        Some("Test Security Key".to_string())
    );
}

#[tokio::test]
async fn test_registration_of_compromised_model() {
    let mds = Mds::new();
    let pki = Pki::new("Vendor");
    mds.publish_statement(&test_statement(), "ATTESTATION_KEY_COMPROMISE");

    let err = RegistrationVerifier::default()
        .with_metadata_provider(Arc::new(mds.provider()))
        .verify(&packed_registration(&pki), &client_data_hash())
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::VerificationFailure);
}
