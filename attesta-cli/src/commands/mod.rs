//! Subcommand implementations.

pub mod decode;
pub mod inspect;
#[cfg(feature = "network")]
pub mod metadata;
pub mod verify;
