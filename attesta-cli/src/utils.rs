//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use attesta_core::{ByteBuffer, Certificate};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Decode textual binary input: hex first, then base64url (as WebAuthn JSON carries it).
pub fn decode_text(text: &str) -> Option<ByteBuffer> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
        if let Ok(buf) = ByteBuffer::from_hex(text) {
            return Some(buf);
        }
    }
    ByteBuffer::from_base64url(text).ok()
}

/// Read a binary input file, accepting raw bytes, hex or base64url text.
pub fn read_binary(path: &Path) -> Result<ByteBuffer> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    if let Some(buf) = std::str::from_utf8(&data).ok().and_then(decode_text) {
        debug!(path = %path.display(), bytes = buf.len(), "Read text-encoded input");
        return Ok(buf);
    }
    debug!(path = %path.display(), bytes = data.len(), "Read raw input");
    Ok(ByteBuffer::new(data))
}

/// Client data hash from either its hex form or the client data JSON file.
pub fn client_data_hash(hex_hash: Option<&str>, client_data: Option<&Path>) -> Result<Vec<u8>> {
    match (hex_hash, client_data) {
        (Some(hash), None) => {
            let hash = hex::decode(hash.trim()).context("Client data hash is not valid hex")?;
            if hash.len() != 32 {
                bail!("Client data hash must be 32 bytes, got {}", hash.len());
            }
            Ok(hash)
        }
        (None, Some(path)) => {
            let json = std::fs::read(path).with_context(|| {
                format!("Failed to read client data file: {}", path.display())
            })?;
            Ok(Sha256::digest(&json).to_vec())
        }
        _ => bail!("Exactly one of --client-data-hash and --client-data is required"),
    }
}

/// Load a trust anchor from a PEM or base64 DER file.
pub fn load_certificate(path: &Path) -> Result<Certificate> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read certificate file: {}", path.display()))?;
    Certificate::from_pem_or_base64(&text)
        .with_context(|| format!("Invalid certificate in {}", path.display()))
}
