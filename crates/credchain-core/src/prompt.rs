//! Interactive fallback when the helper chain comes up empty

use crate::{CredentialRecord, PromptError, Secret};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Username,
    Password,
}

/// A single question to put to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub kind: PromptKind,
    /// e.g. `Password for 'https://alice@example.com': `
    pub text: String,
}

impl PromptRequest {
    pub fn new(kind: PromptKind, record: &CredentialRecord) -> Self {
        let label = match kind {
            PromptKind::Username => "Username",
            PromptKind::Password => "Password",
        };
        Self {
            kind,
            text: format!("{} for '{}': ", label, record.describe()),
        }
    }

    /// Whether input should be echoed
    pub fn echo(&self) -> bool {
        self.kind == PromptKind::Username
    }
}

/// Blocking source of missing credential fields
pub trait Prompter: Send + Sync {
    fn prompt(&self, request: &PromptRequest) -> Result<Secret, PromptError>;
}

/// Never prompts. Used when terminal prompts are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompter;

impl Prompter for NoPrompter {
    fn prompt(&self, _request: &PromptRequest) -> Result<Secret, PromptError> {
        Err(PromptError::Unavailable)
    }
}
