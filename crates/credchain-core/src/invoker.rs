//! Helper process invocation
//!
//! One process per call: the request goes to stdin, the response (for `get`
//! only) comes back on stdout. Every failure of a single helper is logged
//! and swallowed here so that one broken helper cannot abort a chain.

use crate::codec::{self, Attribute};
use crate::{CredentialRecord, Field, HelperCommand, InvokeError};
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use zeroize::Zeroizing;

/// Operation passed as the last argument to a helper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Store,
    Erase,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Store => "store",
            Operation::Erase => "erase",
        }
    }

    /// Only `get` reads a response
    pub fn wants_output(self) -> bool {
        matches!(self, Operation::Get)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a finished helper process left behind
pub struct HelperOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Captured stdout; empty for `store` and `erase`
    pub stdout: Zeroizing<Vec<u8>>,
}

impl HelperOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs one resolved helper command
#[async_trait]
pub trait HelperRunner: Send + Sync {
    /// Spawn `command` with `operation` appended, write `request` to its
    /// stdin, close it, collect stdout when `operation` wants output and
    /// wait for exit.
    async fn run(
        &self,
        command: &HelperCommand,
        operation: Operation,
        request: &[u8],
    ) -> Result<HelperOutput, InvokeError>;
}

/// Spawns real helper processes with tokio
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill helpers that run longer than `timeout`
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl HelperRunner for ProcessRunner {
    async fn run(
        &self,
        command: &HelperCommand,
        operation: Operation,
        request: &[u8],
    ) -> Result<HelperOutput, InvokeError> {
        let (program, args) = command.argv(operation);
        let stdout = if operation.wants_output() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvokeError::Spawn {
                helper: command.to_string(),
                source,
            })?;

        let result = match self.timeout {
            Some(limit) => {
                let outcome = tokio::time::timeout(limit, communicate(&mut child, request)).await;
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        let _ = child.start_kill();
                        return Err(InvokeError::Timeout {
                            helper: command.to_string(),
                            after: limit,
                        });
                    }
                }
            }
            None => communicate(&mut child, request).await,
        };

        result.map_err(|source| InvokeError::Io {
            helper: command.to_string(),
            source,
        })
    }
}

async fn communicate(child: &mut Child, request: &[u8]) -> std::io::Result<HelperOutput> {
    if let Some(mut stdin) = child.stdin.take() {
        // A helper may exit without reading its input
        match stdin.write_all(request).await {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            other => other?,
        }
        drop(stdin);
    }

    let mut stdout = Zeroizing::new(Vec::new());
    if let Some(mut out) = child.stdout.take() {
        out.read_to_end(&mut stdout).await?;
    }

    let status = child.wait().await?;
    Ok(HelperOutput {
        code: status.code(),
        stdout,
    })
}

/// Result of one invocation
#[derive(Debug, Default)]
pub struct Outcome {
    /// Attributes from a `get` response; always empty for `store`/`erase`
    /// and for any helper that failed
    pub attributes: Vec<Attribute>,
}

/// Runs a helper for one operation and isolates its failures
pub struct HelperInvoker {
    runner: Box<dyn HelperRunner>,
}

impl HelperInvoker {
    pub fn new(runner: Box<dyn HelperRunner>) -> Self {
        Self { runner }
    }

    pub async fn invoke(
        &self,
        command: &HelperCommand,
        operation: Operation,
        record: &CredentialRecord,
    ) -> Outcome {
        let request = codec::encode(record, &Field::ALL);
        tracing::debug!("Calling credential helper {} {}", command, operation);

        let output = match self.runner.run(command, operation, request.as_bytes()).await {
            Ok(output) => output,
            Err(e) => {
                if operation.wants_output() {
                    tracing::warn!("{}", e);
                } else {
                    tracing::debug!("Ignoring {} failure: {}", operation, e);
                }
                return Outcome::default();
            }
        };

        if !operation.wants_output() {
            return Outcome::default();
        }

        if !output.success() {
            tracing::debug!(
                "Credential helper {} exited with {:?}, ignoring its output",
                command,
                output.code
            );
            return Outcome::default();
        }

        match codec::decode(&output.stdout) {
            Ok(attributes) => {
                tracing::debug!(
                    "Credential helper {} returned {} attributes",
                    command,
                    attributes.len()
                );
                Outcome { attributes }
            }
            Err(e) => {
                tracing::warn!("Ignoring malformed output from credential helper {}: {}", command, e);
                Outcome::default()
            }
        }
    }
}
