//! Configuration parsing for credchain
//!
//! This crate handles parsing of the global configuration
//! (`~/.config/credchain/config.toml`), which declares the credential helper
//! chain, the helper program prefix and the interactive prompt policy.

mod error;
mod global;

pub use error::*;
pub use global::*;
