//! Attesta CLI - WebAuthn attestation decoding and verification tool.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  65  Attestation malformed, unsupported or rejected
  66  Input file cannot be read
  69  Metadata service unavailable
  77  Attestation verified but not trusted (--require-trusted)
  78  Missing metadata service configuration";

#[derive(Parser)]
#[command(name = "attesta")]
#[command(author, version, about = "WebAuthn attestation decoding and verification", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a CBOR item and print it in diagnostic notation
    #[command(group(ArgGroup::new("input").required(true).args(["file", "hex"])))]
    Decode {
        /// File holding raw, hex or base64url CBOR
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// CBOR given inline as hex or base64url
        #[arg(long, value_name = "HEX")]
        hex: Option<String>,

        /// Decode one item at this byte offset and ignore what follows it
        #[arg(long, value_name = "N")]
        offset: Option<usize>,

        /// Reject maps with duplicate keys
        #[arg(long)]
        strict: bool,
    },

    /// Show the fields of an attestation object without verifying it
    Inspect {
        /// Attestation object (raw, hex or base64url)
        #[arg(value_name = "ATTESTATION_OBJECT")]
        file: PathBuf,

        /// Print a JSON summary instead of text
        #[arg(long)]
        json: bool,
    },

    /// Verify the attestation of a registration response
    #[command(group(ArgGroup::new("client").required(true).args(["client_data_hash", "client_data"])))]
    Verify {
        /// Attestation object (raw, hex or base64url)
        #[arg(value_name = "ATTESTATION_OBJECT")]
        file: PathBuf,

        /// SHA-256 of the client data JSON, as hex
        #[arg(long, value_name = "HEX")]
        client_data_hash: Option<String>,

        /// Client data JSON file (hashed with SHA-256)
        #[arg(long, value_name = "FILE")]
        client_data: Option<PathBuf>,

        /// Trusted root certificate (PEM or base64 DER); repeatable
        #[arg(long = "root", value_name = "PEM")]
        roots: Vec<PathBuf>,

        /// Resolve the authenticator through the metadata service (MDS_* environment)
        #[arg(long)]
        metadata: bool,

        /// Fail unless the attestation chains to a trusted root
        #[arg(long)]
        require_trusted: bool,
    },

    /// Look up an authenticator model in the metadata service (MDS_* environment)
    #[cfg(feature = "network")]
    Metadata {
        /// AAGUID, AAID or attestation certificate key identifier
        #[arg(value_name = "IDENTIFIER")]
        identifier: String,
    },
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "attesta_core=warn,attesta=warn",
        1 => "attesta_core=info,attesta=info",
        _ => "attesta_core=debug,attesta=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Decode {
            file,
            hex,
            offset,
            strict,
        } => commands::decode::execute(file, hex, offset, strict, quiet),
        Commands::Inspect { file, json } => commands::inspect::execute(file, json),
        Commands::Verify {
            file,
            client_data_hash,
            client_data,
            roots,
            metadata,
            require_trusted,
        } => {
            let args = commands::verify::VerifyArgs {
                attestation_object: file,
                client_data_hash,
                client_data,
                roots,
                metadata,
                require_trusted,
            };
            commands::verify::execute(args, quiet).await
        }
        #[cfg(feature = "network")]
        Commands::Metadata { identifier } => commands::metadata::execute(identifier, quiet).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };
    if let Some(message) = &exit.message {
        eprintln!("{} {message}", "Error:".red().bold());
    }
    std::process::exit(exit.code);
}
