//! Inspect command - show the structure of an attestation object without verifying it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use attesta_core::{AttestationObject, AuthenticatorData, CborValue};
use colored::Colorize;
use serde_json::json;
use tracing::info;

use crate::utils;

/// Execute the inspect command.
pub fn execute(file: PathBuf, as_json: bool) -> Result<()> {
    let data = utils::read_binary(&file)?;
    let object = AttestationObject::parse(&data).context("Failed to parse attestation object")?;
    let auth_data = object.auth_data();

    info!(format = object.format(), bytes = data.len(), "Parsed attestation object");

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary(&object))?);
        return Ok(());
    }

    let flags = auth_data.flags();
    println!();
    println!("{} {}", "Format:".dimmed(), object.format().bold());
    println!(
        "{} {}",
        "Statement:".dimmed(),
        CborValue::Map(object.statement().clone())
    );
    println!("{} {}", "RP ID hash:".dimmed(), hex::encode(auth_data.rp_id_hash()));
    println!(
        "{} {:#04x} (UP={} UV={} AT={} ED={})",
        "Flags:".dimmed(),
        flags.bits(),
        flags.user_present(),
        flags.user_verified(),
        flags.has_attested_credential_data(),
        flags.has_extension_data()
    );
    println!("{} {}", "Sign count:".dimmed(), auth_data.sign_count());

    if let Some(credential) = auth_data.attested_credential() {
        println!("{} {}", "AAGUID:".dimmed(), credential.aaguid);
        println!(
            "{} {}",
            "Credential ID:".dimmed(),
            credential.credential_id.to_base64url()
        );
        println!("{} {}", "Public key:".dimmed(), key_algorithm(auth_data));
    }
    if let Some(extensions) = auth_data.extensions() {
        println!(
            "{} {}",
            "Extensions:".dimmed(),
            CborValue::Map(extensions.clone())
        );
    }
    Ok(())
}

fn key_algorithm(auth_data: &AuthenticatorData) -> String {
    auth_data
        .attested_credential()
        .and_then(|c| c.public_key.algorithm())
        .map(|alg| alg.to_string())
        .unwrap_or_else(|| "unspecified algorithm".into())
}

fn summary(object: &AttestationObject) -> serde_json::Value {
    let auth_data = object.auth_data();
    let credential = auth_data.attested_credential().map(|c| {
        json!({
            "aaguid": c.aaguid.to_string(),
            "credentialId": c.credential_id.to_base64url(),
            "algorithm": key_algorithm(auth_data),
        })
    });
    json!({
        "fmt": object.format(),
        "attStmt": CborValue::Map(object.statement().clone()).to_string(),
        "rpIdHash": hex::encode(auth_data.rp_id_hash()),
        "flags": auth_data.flags().bits(),
        "signCount": auth_data.sign_count(),
        "attestedCredential": credential,
        "extensions": auth_data.extensions().map(|e| CborValue::Map(e.clone()).to_string()),
    })
}
