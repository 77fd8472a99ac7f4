//! Core logic for credchain credential resolution
//!
//! This crate provides:
//! - The line-oriented `key=value` helper wire format
//! - Helper specifier resolution (`!snippet`, absolute paths, named helpers)
//! - Helper process invocation with failure isolation
//! - The fill / approve / reject / clear credential lifecycle
//! - URL decomposition into credential context

pub mod codec;
mod context;
mod error;
mod helper;
mod invoker;
mod prompt;
mod record;
mod resolver;
mod secret;
mod url_parts;

pub use codec::Attribute;
pub use context::*;
pub use error::*;
pub use helper::*;
pub use invoker::*;
pub use prompt::*;
pub use record::*;
pub use resolver::*;
pub use secret::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
