//! Metadata command - resolve an authenticator model through the metadata service.

use std::sync::Arc;

use anyhow::{Context, Result};
use attesta_core::{
    AttestaError, AuthenticatorIdentifier, HttpDownloader, HttpDownloaderConfig, MemoryCachePool,
    MetadataLookup, MetadataServiceProvider, MetadataServiceSource,
};
use colored::Colorize;
use tracing::info;
use uuid::Uuid;

/// Provider configured from `MDS_URL`, `MDS_ROOT_CERT[_PEM]` and `MDS_ACCESS_TOKEN`.
pub fn provider_from_env() -> Result<MetadataServiceProvider> {
    let source = MetadataServiceSource::from_env()?;
    info!(url = %source.url, "Using metadata service");
    let downloader = HttpDownloader::new(HttpDownloaderConfig::default())?;
    let provider = MetadataServiceProvider::new(
        source,
        Arc::new(downloader),
        Arc::new(MemoryCachePool::new()),
    )?;
    Ok(provider)
}

fn parse_identifier(text: &str) -> Result<AuthenticatorIdentifier> {
    if let Ok(aaguid) = Uuid::parse_str(text) {
        return AuthenticatorIdentifier::from_aaguid(aaguid)
            .context("The nil AAGUID does not identify an authenticator model");
    }
    if text.contains('#') {
        return Ok(AuthenticatorIdentifier::Aaid(text.to_string()));
    }
    if text.len() == 40 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Ok(AuthenticatorIdentifier::key_identifier(text));
    }
    anyhow::bail!("'{text}' is not an AAGUID, AAID or attestation key identifier")
}

/// Execute the metadata command.
pub async fn execute(identifier: String, quiet: bool) -> Result<()> {
    let identifier = parse_identifier(&identifier)?;
    let provider = provider_from_env()?;

    let toc = provider.toc().await.context("Failed to load metadata TOC")?;
    let lookup = provider
        .lookup(&identifier)
        .await
        .context("Metadata lookup failed")?;

    match lookup {
        MetadataLookup::Found(statement) => {
            if !quiet {
                println!();
                println!("{} {}", "Description:".dimmed(), statement.description.bold());
                println!("{} {}", "TOC serial:".dimmed(), toc.no);
                if let Some(protocol) = &statement.protocol_family {
                    println!("{} {}", "Protocol:".dimmed(), protocol);
                }
                println!(
                    "{} {}",
                    "Authenticator version:".dimmed(),
                    statement.authenticator_version
                );
                println!(
                    "{} {}",
                    "Trust anchors:".dimmed(),
                    statement.trust_anchors().len()
                );
                for report in &statement.status_reports {
                    let date = report
                        .effective_date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".into());
                    let line = format!("{:?} ({date})", report.status);
                    if report.status.is_compromise() {
                        println!("   {}", line.red());
                    } else {
                        println!("   {line}");
                    }
                }
            }
            Ok(())
        }
        MetadataLookup::NotListed => {
            println!("{} {identifier} is not listed in the metadata TOC", "!".yellow());
            Ok(())
        }
        MetadataLookup::NoStatement => {
            println!("{} {identifier} is listed without a metadata statement", "!".yellow());
            Ok(())
        }
        MetadataLookup::HashMismatch {
            url,
            expected,
            actual,
        } => Err(AttestaError::TrustResolution(format!(
            "metadata statement at {url} does not match its TOC hash (expected {expected}, got {actual})"
        ))
        .into()),
    }
}
