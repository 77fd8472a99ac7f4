//! Error types for credchain-core

use crate::CredentialState;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Configuration error: {0}")]
    Config(#[from] credchain_config::ConfigError),

    #[error("Invalid credential URL: {0}")]
    Url(#[from] ParseError),

    #[error("No credentials available for {description}: {reason}")]
    FillExhausted { description: String, reason: String },

    #[error("Credential helper '{helper}' told us to quit")]
    HelperQuit { helper: String },

    #[error("Cannot {operation} a credential in state {state}")]
    InvalidState {
        operation: &'static str,
        state: CredentialState,
    },

    #[error("Incomplete credential for {0}: username and password are required")]
    Incomplete(String),
}

/// URL decomposition failures.
///
/// Never carries the input, which may embed a password.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing '://' separator")]
    MissingScheme,

    #[error("{0}")]
    Malformed(#[from] ::url::ParseError),

    #[error("{0} is not valid percent-encoded UTF-8")]
    BadEncoding(&'static str),
}

/// Malformed helper output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("helper output is not valid UTF-8")]
    InvalidUtf8,

    #[error("NUL byte in helper output on line {0}")]
    Nul(usize),
}

/// A helper specifier that cannot be turned into a command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecifierError {
    #[error("unbalanced quoting in helper specifier")]
    BadQuoting,
}

/// Failure to run one helper process
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("failed to spawn credential helper {helper}: {source}")]
    Spawn {
        helper: String,
        source: std::io::Error,
    },

    #[error("I/O error talking to credential helper {helper}: {source}")]
    Io {
        helper: String,
        source: std::io::Error,
    },

    #[error("credential helper {helper} timed out after {after:?}")]
    Timeout { helper: String, after: Duration },
}

/// The interactive fallback could not produce a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("terminal prompts are disabled")]
    Unavailable,

    #[error("prompt cancelled")]
    Cancelled,

    #[error("prompt failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, CredentialError>;
