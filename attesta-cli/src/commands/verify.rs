//! Verify command - run a registration's attestation through the full verifier.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use attesta_core::{RegistrationResult, RegistrationVerifier};
use colored::Colorize;
use tracing::{info, warn};

use crate::utils;

pub struct VerifyArgs {
    pub attestation_object: PathBuf,
    pub client_data_hash: Option<String>,
    pub client_data: Option<PathBuf>,
    pub roots: Vec<PathBuf>,
    pub metadata: bool,
    pub require_trusted: bool,
}

/// Execute the verify command.
pub async fn execute(args: VerifyArgs, quiet: bool) -> Result<()> {
    let object = utils::read_binary(&args.attestation_object)?;
    let client_data_hash =
        utils::client_data_hash(args.client_data_hash.as_deref(), args.client_data.as_deref())?;

    let mut verifier = RegistrationVerifier::default();
    for path in &args.roots {
        let root = utils::load_certificate(path)?;
        info!(subject = %root.subject(), "Loaded trust anchor");
        verifier = verifier.with_trust_anchor(root);
    }
    if args.metadata {
        verifier = verifier.with_metadata_provider(Arc::new(metadata_provider()?));
    }

    let result = verifier
        .verify(&object, &client_data_hash)
        .await
        .context("Attestation verification failed")?;

    if !quiet {
        print_result(&result);
    }

    if args.require_trusted && !result.trusted {
        warn!(format = %result.format, "Attestation is not trusted");
        bail!("Attestation verified but is not trusted by any configured root");
    }
    Ok(())
}

#[cfg(feature = "network")]
fn metadata_provider() -> Result<attesta_core::MetadataServiceProvider> {
    super::metadata::provider_from_env()
}

#[cfg(not(feature = "network"))]
fn metadata_provider() -> Result<attesta_core::MetadataServiceProvider> {
    bail!("Metadata lookups need the `network` feature")
}

fn print_result(result: &RegistrationResult) {
    let banner = if result.trusted {
        "║               TRUSTED                  ║"
    } else {
        "║          VERIFIED (UNTRUSTED)          ║"
    };
    let paint = |s: &str| if result.trusted { s.green() } else { s.yellow() };

    println!();
    println!("{}", paint("╔════════════════════════════════════════╗"));
    println!("{}", paint(banner).bold());
    println!("{}", paint("╚════════════════════════════════════════╝"));
    println!();
    println!("   {} {}", "Format:".dimmed(), result.format);
    println!(
        "   {} {}",
        "Attestation:".dimmed(),
        result.verification_result.attestation_type()
    );
    println!("   {} {}", "AAGUID:".dimmed(), result.aaguid);
    println!(
        "   {} {}",
        "Credential ID:".dimmed(),
        result.credential_id.to_base64url()
    );
    if let Some(alg) = result.public_key.algorithm() {
        println!("   {} {}", "Key algorithm:".dimmed(), alg);
    }
    println!("   {} {}", "Sign count:".dimmed(), result.sign_count);
    println!(
        "   {} {}",
        "Chain length:".dimmed(),
        result.verification_result.trust_path().len()
    );
    if let Some(statement) = &result.metadata {
        println!("   {} {}", "Metadata:".dimmed(), statement.description);
        if let Some(status) = statement.current_status() {
            println!("   {} {:?}", "Status:".dimmed(), status);
        }
    }
}
