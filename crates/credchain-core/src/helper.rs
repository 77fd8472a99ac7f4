//! Helper specifier resolution
//!
//! A specifier is the string a user writes in the helper chain:
//! - `!snippet` runs `snippet <operation>` through the shell
//! - `/abs/path --flag` runs that program directly
//! - `name --flag` runs `<prefix>name --flag`

use crate::{Operation, SpecifierError};
use credchain_config::CredentialConfig;
use std::fmt;
use std::path::Path;

/// A parsed helper specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperSpecifier {
    ShellSnippet(String),
    AbsolutePathCommand { path: String, args: Vec<String> },
    NamedHelper { name: String, args: Vec<String> },
}

impl HelperSpecifier {
    /// Parse `spec`. Empty specifiers yield `None` and are skipped by callers.
    pub fn parse(spec: &str) -> Result<Option<Self>, SpecifierError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(None);
        }

        if let Some(snippet) = spec.strip_prefix('!') {
            let snippet = snippet.trim();
            if snippet.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Self::ShellSnippet(snippet.to_string())));
        }

        let mut words = split(spec)?.into_iter();
        let Some(first) = words.next() else {
            return Ok(None);
        };
        let args = words.collect();

        if Path::new(spec).is_absolute() {
            Ok(Some(Self::AbsolutePathCommand { path: first, args }))
        } else {
            Ok(Some(Self::NamedHelper { name: first, args }))
        }
    }
}

/// Something that can be spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperCommand {
    /// `<shell> -c "<script> <operation>"`
    Shell { shell: String, script: String },
    /// `<program> <args>... <operation>`
    Program { program: String, args: Vec<String> },
}

impl HelperCommand {
    /// Program and argument vector for `operation`
    pub fn argv(&self, operation: Operation) -> (String, Vec<String>) {
        match self {
            HelperCommand::Shell { shell, script } => (
                shell.clone(),
                vec!["-c".to_string(), format!("{} {}", script, operation)],
            ),
            HelperCommand::Program { program, args } => {
                let mut argv = args.clone();
                argv.push(operation.to_string());
                (program.clone(), argv)
            }
        }
    }
}

/// Short name for logs. Scripts and arguments are left out since they may
/// embed secrets.
impl fmt::Display for HelperCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelperCommand::Shell { script, .. } => {
                let head = script.split_whitespace().next().unwrap_or_default();
                write!(f, "!{}", head)
            }
            HelperCommand::Program { program, .. } => f.write_str(program),
        }
    }
}

/// Turns specifier strings into [`HelperCommand`]s
#[derive(Debug, Clone)]
pub struct HelperCommandBuilder {
    prefix: String,
    shell: String,
}

impl HelperCommandBuilder {
    pub fn new(prefix: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            shell: shell.into(),
        }
    }

    pub fn from_config(config: &CredentialConfig) -> Self {
        Self::new(&config.helper_prefix, &config.shell)
    }

    /// Resolve `spec`. `Ok(None)` means a no-op helper.
    pub fn build(&self, spec: &str) -> Result<Option<HelperCommand>, SpecifierError> {
        let Some(parsed) = HelperSpecifier::parse(spec)? else {
            return Ok(None);
        };

        let command = match parsed {
            HelperSpecifier::ShellSnippet(script) => HelperCommand::Shell {
                shell: self.shell.clone(),
                script,
            },
            HelperSpecifier::AbsolutePathCommand { path, args } => HelperCommand::Program {
                program: path,
                args,
            },
            HelperSpecifier::NamedHelper { .. } => {
                // The prefix is glued to the raw text before splitting, so a
                // quoted name stays one word.
                let mut words = split(&format!("{}{}", self.prefix, spec.trim()))?.into_iter();
                let program = words.next().unwrap_or_default();
                HelperCommand::Program {
                    program,
                    args: words.collect(),
                }
            }
        };
        Ok(Some(command))
    }
}

fn split(line: &str) -> Result<Vec<String>, SpecifierError> {
    shell_words::split(line).map_err(|_| SpecifierError::BadQuoting)
}
