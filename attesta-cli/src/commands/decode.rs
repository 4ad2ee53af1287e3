//! Decode command - print a CBOR item in diagnostic notation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use attesta_core::cbor::{self, DecodeOptions};
use attesta_core::AttestaError;
use colored::Colorize;
use tracing::info;

use crate::utils;

/// Execute the decode command.
pub fn execute(
    file: Option<PathBuf>,
    hex_input: Option<String>,
    offset: Option<usize>,
    strict: bool,
    quiet: bool,
) -> Result<()> {
    let data = match (file, hex_input) {
        (Some(path), None) => utils::read_binary(&path)?,
        (None, Some(text)) => {
            utils::decode_text(&text).context("Input is neither hex nor base64url")?
        }
        _ => bail!("Provide either FILE or --hex"),
    };

    let options = if strict {
        DecodeOptions::strict()
    } else {
        DecodeOptions::default()
    };

    let (value, end) = match offset {
        // One item at OFFSET; trailing bytes belong to the caller.
        Some(start) => cbor::decode_in_place_with(&data, start, options)
            .map_err(AttestaError::from)
            .context("Failed to decode CBOR item")?,
        None => (
            cbor::decode_with(&data, options)
                .map_err(AttestaError::from)
                .context("Failed to decode CBOR")?,
            data.len(),
        ),
    };

    info!(bytes = data.len(), end, "Decoded CBOR item");

    println!("{value}");
    if !quiet && offset.is_some() {
        eprintln!("{} {}", "Item ends at offset:".dimmed(), end);
    }
    Ok(())
}
