//! Test support utilities for credchain-core
//!
//! Provides FakeRunner and FakePrompter for unit testing the Resolver
//! without spawning helper processes or touching a terminal.

use crate::{
    HelperCommand, HelperOutput, HelperRunner, InvokeError, Operation, PromptError, PromptRequest,
    Prompter, Secret,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zeroize::Zeroizing;

/// One recorded helper invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerCall {
    /// Program name, or the script of a shell snippet
    pub helper: String,
    pub operation: Operation,
    /// The request exactly as it would have been written to stdin
    pub request: String,
}

/// Canned behavior for one helper
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Exit { code: i32, stdout: String },
    SpawnError,
    Timeout,
    /// Never finishes
    Hang,
}

/// Helper runner that answers from a table instead of spawning processes.
///
/// Helpers without an entry exit 0 with no output.
pub struct FakeRunner {
    pub responses: HashMap<String, FakeResponse>,
    pub calls: Arc<Mutex<Vec<RunnerCall>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Helper `key` exits 0 and prints `stdout`
    pub fn respond(self, key: &str, stdout: &str) -> Self {
        self.with(
            key,
            FakeResponse::Exit {
                code: 0,
                stdout: stdout.to_string(),
            },
        )
    }

    pub fn with(mut self, key: &str, response: FakeResponse) -> Self {
        self.responses.insert(key.to_string(), response);
        self
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<RunnerCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn key_of(command: &HelperCommand) -> String {
    match command {
        HelperCommand::Shell { script, .. } => script.clone(),
        HelperCommand::Program { program, .. } => program.clone(),
    }
}

#[async_trait]
impl HelperRunner for FakeRunner {
    async fn run(
        &self,
        command: &HelperCommand,
        operation: Operation,
        request: &[u8],
    ) -> Result<HelperOutput, InvokeError> {
        let helper = key_of(command);
        self.calls.lock().unwrap().push(RunnerCall {
            helper: helper.clone(),
            operation,
            request: String::from_utf8_lossy(request).into_owned(),
        });

        match self.responses.get(&helper) {
            None => Ok(HelperOutput {
                code: Some(0),
                stdout: Zeroizing::new(Vec::new()),
            }),
            Some(FakeResponse::Exit { code, stdout }) => {
                let stdout = if operation.wants_output() {
                    stdout.as_bytes().to_vec()
                } else {
                    Vec::new()
                };
                Ok(HelperOutput {
                    code: Some(*code),
                    stdout: Zeroizing::new(stdout),
                })
            }
            Some(FakeResponse::SpawnError) => Err(InvokeError::Spawn {
                helper,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
            Some(FakeResponse::Timeout) => Err(InvokeError::Timeout {
                helper,
                after: Duration::from_secs(5),
            }),
            Some(FakeResponse::Hang) => std::future::pending().await,
        }
    }
}

/// Prompter that replays queued answers and records what it was asked.
///
/// Once the queue is empty every prompt is `Unavailable`.
pub struct FakePrompter {
    pub answers: Mutex<VecDeque<Result<String, PromptError>>>,
    pub asked: Arc<Mutex<Vec<PromptRequest>>>,
}

impl FakePrompter {
    pub fn new(answers: Vec<Result<String, PromptError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            asked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn answers(answers: &[&str]) -> Self {
        Self::new(answers.iter().map(|a| Ok(a.to_string())).collect())
    }

    pub fn unavailable() -> Self {
        Self::new(Vec::new())
    }
}

impl Prompter for FakePrompter {
    fn prompt(&self, request: &PromptRequest) -> Result<Secret, PromptError> {
        self.asked.lock().unwrap().push(request.clone());
        match self.answers.lock().unwrap().pop_front() {
            Some(answer) => answer.map(Secret::from),
            None => Err(PromptError::Unavailable),
        }
    }
}
