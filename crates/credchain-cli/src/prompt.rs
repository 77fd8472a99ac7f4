//! Terminal prompter for the interactive fallback

use credchain_core::{PromptError, PromptKind, PromptRequest, Prompter, Secret};
use dialoguer::{Input, Password};
use std::io::IsTerminal;

/// Environment variable that disables terminal prompts when set to `0`
pub const TERMINAL_PROMPT_ENV: &str = "CREDCHAIN_TERMINAL_PROMPT";

/// True when `CREDCHAIN_TERMINAL_PROMPT` turns prompting off
pub fn terminal_prompt_disabled() -> bool {
    std::env::var(TERMINAL_PROMPT_ENV)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
        .unwrap_or(false)
}

/// Asks on the controlling terminal via dialoguer.
///
/// Unavailable when stderr is not a terminal, since stdin and stdout carry
/// the helper protocol.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&self, request: &PromptRequest) -> Result<Secret, PromptError> {
        if !std::io::stderr().is_terminal() {
            return Err(PromptError::Unavailable);
        }

        // dialoguer appends its own ": "
        let text = request.text.trim_end().trim_end_matches(':');
        let answer = match request.kind {
            PromptKind::Username => Input::<String>::new()
                .with_prompt(text)
                .allow_empty(true)
                .interact_text(),
            PromptKind::Password => Password::new()
                .with_prompt(text)
                .allow_empty_password(true)
                .interact(),
        };

        answer.map(Secret::from).map_err(|e| match e {
            dialoguer::Error::IO(io) if io.kind() == std::io::ErrorKind::Interrupted => {
                PromptError::Cancelled
            }
            other => PromptError::Failed(other.to_string()),
        })
    }
}
