//! Example demonstrating metadata service tracing instrumentation.
//!
//! Resolves one authenticator through the metadata service configured with
//! `MDS_URL`, `MDS_ROOT_CERT` (or `MDS_ROOT_CERT_PEM`) and `MDS_ACCESS_TOKEN`.
//!
//! Run with: cargo run -p attesta-core --example mds_tracing -- <AAGUID>

use std::sync::Arc;

use attesta_core::metadata::{
    AuthenticatorIdentifier, MemoryCachePool, MetadataLookup, MetadataServiceProvider,
    MetadataServiceSource,
};
use attesta_core::remote::{HttpDownloader, HttpDownloaderConfig};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::new("attesta_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Metadata Service Tracing Demo ===\n");

    let Some(aaguid) = std::env::args().nth(1).and_then(|a| Uuid::parse_str(&a).ok()) else {
        eprintln!("Usage: mds_tracing <AAGUID>");
        return;
    };

    let source = match MetadataServiceSource::from_env() {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read configuration: {}", e);
            return;
        }
    };
    println!("Source: {:?}\n", source);

    let provider = HttpDownloader::new(HttpDownloaderConfig::default()).and_then(|downloader| {
        MetadataServiceProvider::new(
            source,
            Arc::new(downloader),
            Arc::new(MemoryCachePool::new()),
        )
    });
    let provider = match provider {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to create provider: {}", e);
            return;
        }
    };

    let identifier = AuthenticatorIdentifier::Aaguid(aaguid);
    // The second lookup is served from the TOC and statement caches.
    for round in 1..=2 {
        println!("\nLookup #{}...\n", round);
        match provider.lookup(&identifier).await {
            Ok(MetadataLookup::Found(statement)) => {
                println!("\n✅ {}", statement.description);
                println!("   Status: {:?}", statement.current_status());
            }
            Ok(other) => println!("\n⚠️  No metadata: {:?}", other),
            Err(e) => {
                println!("\n❌ Failed: {}", e);
                return;
            }
        }
    }
}
