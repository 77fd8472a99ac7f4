//! Credential lifecycle over an ordered helper chain
//!
//! `fill` folds the `get` responses of every helper into the record in
//! declared order, so a later helper overrides an earlier one, then asks the
//! prompter for whatever is still missing. `approve` and `reject` notify
//! every helper with `store` / `erase` and ignore the results.

use crate::{
    CredentialError, CredentialRecord, CredentialState, HelperCommand, HelperCommandBuilder,
    HelperInvoker, HelperRunner, NoPrompter, Operation, ProcessRunner, PromptKind, PromptRequest,
    Prompter, Result,
};
use credchain_config::CredentialConfig;

/// Drives the helper chain for any number of records.
///
/// Holds no per-record state; independent records can be resolved
/// concurrently through a shared reference.
pub struct Resolver {
    builder: HelperCommandBuilder,
    invoker: HelperInvoker,
    prompter: Box<dyn Prompter>,
}

impl Resolver {
    pub fn new(
        builder: HelperCommandBuilder,
        runner: Box<dyn HelperRunner>,
        prompter: Box<dyn Prompter>,
    ) -> Self {
        Self {
            builder,
            invoker: HelperInvoker::new(runner),
            prompter,
        }
    }

    /// Real helper processes, with the prompter replaced by [`NoPrompter`]
    /// when `config.interactive` is off.
    pub fn from_config(config: &CredentialConfig, prompter: Box<dyn Prompter>) -> Self {
        let prompter: Box<dyn Prompter> = if config.interactive {
            prompter
        } else {
            Box::new(NoPrompter)
        };
        Self::new(
            HelperCommandBuilder::from_config(config),
            Box::new(ProcessRunner::with_timeout(config.helper_timeout())),
            prompter,
        )
    }

    /// Populate username and password on `record`.
    ///
    /// On success both are present. On any error they are wiped and the
    /// record is back in [`CredentialState::Empty`].
    pub async fn fill(&self, record: &mut CredentialRecord) -> Result<()> {
        match record.state() {
            CredentialState::Empty | CredentialState::Rejected => {}
            CredentialState::Filled | CredentialState::Approved if record.has_credentials() => {
                tracing::debug!("Credential for {} already filled", record.describe());
                return Ok(());
            }
            state => {
                return Err(CredentialError::InvalidState {
                    operation: "fill",
                    state,
                })
            }
        }

        record.set_state(CredentialState::Filling);
        record.reset_quit();

        // Also covers the future being dropped mid-chain
        let mut guard = FillGuard {
            record,
            filled: false,
        };
        self.fill_from_sources(&mut *guard.record).await?;
        guard.record.set_state(CredentialState::Filled);
        guard.filled = true;
        Ok(())
    }

    async fn fill_from_sources(&self, record: &mut CredentialRecord) -> Result<()> {
        let helpers = record.helpers.clone();
        for spec in &helpers {
            let Some(command) = self.command_for(spec) else {
                continue;
            };
            let outcome = self.invoker.invoke(&command, Operation::Get, record).await;
            for attribute in &outcome.attributes {
                record.apply(attribute);
            }
            if record.quit() {
                return Err(CredentialError::HelperQuit {
                    helper: command.to_string(),
                });
            }
        }

        if record.username.is_none() {
            let request = PromptRequest::new(PromptKind::Username, record);
            let answer = self
                .prompter
                .prompt(&request)
                .map_err(|e| exhausted(record, e))?;
            record.username = Some(answer.expose().to_string());
        }

        if record.password.is_none() {
            let request = PromptRequest::new(PromptKind::Password, record);
            let answer = self
                .prompter
                .prompt(&request)
                .map_err(|e| exhausted(record, e))?;
            record.password = Some(answer);
        }

        if !record.has_credentials() {
            return Err(CredentialError::FillExhausted {
                description: record.describe(),
                reason: "no helper or prompt produced a username and password".to_string(),
            });
        }

        tracing::debug!("Filled credential for {}", record.describe());
        Ok(())
    }

    /// Tell every helper the credential worked. Idempotent once approved.
    pub async fn approve(&self, record: &mut CredentialRecord) -> Result<()> {
        match record.state() {
            CredentialState::Filled => {}
            CredentialState::Approved => return Ok(()),
            state => {
                return Err(CredentialError::InvalidState {
                    operation: "approve",
                    state,
                })
            }
        }

        self.notify(record, Operation::Store).await;
        record.set_state(CredentialState::Approved);
        Ok(())
    }

    /// Tell every helper the credential failed, then wipe username and
    /// password so the record can be filled again.
    pub async fn reject(&self, record: &mut CredentialRecord) -> Result<()> {
        match record.state() {
            CredentialState::Filled | CredentialState::Approved => {}
            state => {
                return Err(CredentialError::InvalidState {
                    operation: "reject",
                    state,
                })
            }
        }

        self.notify(record, Operation::Erase).await;
        record.clear_secrets();
        record.set_state(CredentialState::Rejected);
        Ok(())
    }

    /// Wipe every field of `record`, secrets included. Allowed in any state.
    pub fn clear(&self, record: &mut CredentialRecord) {
        record.wipe();
    }

    async fn notify(&self, record: &CredentialRecord, operation: Operation) {
        tracing::debug!(
            "Sending {} for {} to {} helpers",
            operation,
            record.describe(),
            record.helpers.len()
        );
        for spec in &record.helpers {
            if let Some(command) = self.command_for(spec) {
                self.invoker.invoke(&command, operation, record).await;
            }
        }
    }

    fn command_for(&self, spec: &str) -> Option<HelperCommand> {
        match self.builder.build(spec) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Skipping credential helper: {}", e);
                None
            }
        }
    }
}

/// Rolls a record back to `Empty` without secrets unless the fill completed
struct FillGuard<'a> {
    record: &'a mut CredentialRecord,
    filled: bool,
}

impl Drop for FillGuard<'_> {
    fn drop(&mut self) {
        if !self.filled {
            self.record.clear_secrets();
            self.record.reset_quit();
            self.record.set_state(CredentialState::Empty);
        }
    }
}

fn exhausted(record: &CredentialRecord, reason: crate::PromptError) -> CredentialError {
    CredentialError::FillExhausted {
        description: record.describe(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePrompter, FakeResponse, FakeRunner};
    use crate::{Field, PromptError};
    use std::time::Duration;

    const PREFIX: &str = "git-credential-";

    fn resolver(runner: FakeRunner, prompter: FakePrompter) -> Resolver {
        Resolver::new(
            HelperCommandBuilder::new(PREFIX, "/bin/sh"),
            Box::new(runner),
            Box::new(prompter),
        )
    }

    fn record(helpers: &[&str]) -> CredentialRecord {
        let mut record = CredentialRecord::with_context("https", "example.com");
        record.path = Some("/repo.git".to_string());
        record.helpers = helpers.iter().map(|h| h.to_string()).collect();
        record
    }

    fn helper(name: &str) -> String {
        format!("{}{}", PREFIX, name)
    }

    #[tokio::test]
    async fn test_fill_unions_disjoint_helpers() {
        for order in [["a", "b"], ["b", "a"]] {
            let runner = FakeRunner::new()
                .respond(&helper("a"), "username=alice\n")
                .respond(&helper("b"), "password=pw\n");
            let resolver = resolver(runner, FakePrompter::unavailable());
            let mut record = record(&order);

            resolver.fill(&mut record).await.unwrap();
            assert_eq!(record.username.as_deref(), Some("alice"));
            assert_eq!(record.get(Field::Password), Some("pw"));
            assert_eq!(record.state(), CredentialState::Filled);
        }
    }

    #[tokio::test]
    async fn test_later_helper_wins() {
        let runner = FakeRunner::new()
            .respond(&helper("generic"), "username=alice\npassword=old\n")
            .respond(&helper("specific"), "password=new\n");
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["generic", "specific"]);

        resolver.fill(&mut record).await.unwrap();
        assert_eq!(record.get(Field::Password), Some("new"));
        assert_eq!(record.username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_broken_helpers_do_not_stop_chain() {
        let runner = FakeRunner::new()
            .with(&helper("missing"), FakeResponse::SpawnError)
            .with(
                &helper("failing"),
                FakeResponse::Exit {
                    code: 2,
                    stdout: "password=wrong\n".to_string(),
                },
            )
            .respond(&helper("garbled"), "\u{0}\n")
            .respond(&helper("good"), "username=alice\npassword=pw\n");
        let calls = runner.calls.clone();
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["missing", "failing", "garbled", "good"]);

        resolver.fill(&mut record).await.unwrap();
        assert_eq!(record.get(Field::Password), Some("pw"));
        assert_eq!(calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_helpers_see_accumulated_record() {
        let runner = FakeRunner::new().respond(&helper("a"), "username=alice\n");
        let calls = runner.calls.clone();
        let resolver = resolver(runner, FakePrompter::answers(&["pw"]));
        let mut record = record(&["a", "b"]);

        resolver.fill(&mut record).await.unwrap();
        let calls = calls.lock().unwrap();
        assert_eq!(calls[1].helper, helper("b"));
        assert!(calls[1].request.contains("username=alice\n"));
    }

    #[tokio::test]
    async fn test_empty_and_bad_specifiers_are_skipped() {
        let runner = FakeRunner::new().respond(&helper("good"), "username=alice\npassword=pw\n");
        let calls = runner.calls.clone();
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["", "bad 'quote", "good"]);

        resolver.fill(&mut record).await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_fills_missing_fields() {
        let runner = FakeRunner::new().respond(&helper("a"), "username=alice\n");
        let prompter = FakePrompter::answers(&["typed-pw"]);
        let asked = prompter.asked.clone();
        let resolver = resolver(runner, prompter);
        let mut record = record(&["a"]);

        resolver.fill(&mut record).await.unwrap();
        assert_eq!(record.get(Field::Password), Some("typed-pw"));
        let asked = asked.lock().unwrap();
        assert_eq!(asked.len(), 1);
        assert_eq!(asked[0].kind, PromptKind::Password);
        assert_eq!(asked[0].text, "Password for 'https://alice@example.com/repo.git': ");
    }

    #[tokio::test]
    async fn test_prompt_asks_username_then_password() {
        let prompter = FakePrompter::answers(&["bob", "pw"]);
        let asked = prompter.asked.clone();
        let resolver = resolver(FakeRunner::new(), prompter);
        let mut record = record(&[]);

        resolver.fill(&mut record).await.unwrap();
        assert_eq!(record.username.as_deref(), Some("bob"));
        let kinds: Vec<_> = asked.lock().unwrap().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![PromptKind::Username, PromptKind::Password]);
    }

    #[tokio::test]
    async fn test_fill_exhausted_without_helpers_or_prompt() {
        let resolver = resolver(FakeRunner::new(), FakePrompter::unavailable());
        let mut record = record(&[]);

        let err = resolver.fill(&mut record).await.unwrap_err();
        assert!(matches!(err, CredentialError::FillExhausted { .. }));
        assert!(record.username.is_none());
        assert!(record.password.is_none());
        assert_eq!(record.state(), CredentialState::Empty);
    }

    #[tokio::test]
    async fn test_failed_fill_never_leaves_partial_secrets() {
        let runner = FakeRunner::new().respond(&helper("a"), "username=alice\n");
        let prompter = FakePrompter::new(vec![Err(PromptError::Cancelled)]);
        let resolver = resolver(runner, prompter);
        let mut record = record(&["a"]);

        let err = resolver.fill(&mut record).await.unwrap_err();
        assert!(matches!(err, CredentialError::FillExhausted { .. }));
        assert!(record.username.is_none());
        assert_eq!(record.host.as_deref(), Some("example.com"));
    }

    #[tokio::test]
    async fn test_quit_stops_chain() {
        let runner = FakeRunner::new()
            .respond(&helper("a"), "username=alice\nquit=1\n")
            .respond(&helper("b"), "password=pw\n");
        let calls = runner.calls.clone();
        let resolver = resolver(runner, FakePrompter::answers(&["pw"]));
        let mut record = record(&["a", "b"]);

        let err = resolver.fill(&mut record).await.unwrap_err();
        assert!(matches!(err, CredentialError::HelperQuit { .. }));
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(record.username.is_none());
        assert!(!record.quit());
    }

    #[tokio::test]
    async fn test_fill_is_cached_once_filled() {
        let runner = FakeRunner::new().respond(&helper("a"), "username=alice\npassword=pw\n");
        let calls = runner.calls.clone();
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["a"]);

        resolver.fill(&mut record).await.unwrap();
        resolver.fill(&mut record).await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_approve_stores_to_every_helper() {
        let runner = FakeRunner::new()
            .respond(&helper("a"), "username=alice\npassword=pw\n")
            .with(&helper("b"), FakeResponse::SpawnError);
        let calls = runner.calls.clone();
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["a", "b", "c"]);

        resolver.fill(&mut record).await.unwrap();
        resolver.approve(&mut record).await.unwrap();
        assert_eq!(record.state(), CredentialState::Approved);

        let calls = calls.lock().unwrap();
        let stores: Vec<_> = calls
            .iter()
            .filter(|c| c.operation == Operation::Store)
            .map(|c| c.helper.clone())
            .collect();
        assert_eq!(stores, vec![helper("a"), helper("b"), helper("c")]);
        assert!(calls[3].request.contains("password=pw\n"));
    }

    #[tokio::test]
    async fn test_approve_twice_stores_once() {
        let runner = FakeRunner::new().respond(&helper("a"), "username=alice\npassword=pw\n");
        let calls = runner.calls.clone();
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["a"]);

        resolver.fill(&mut record).await.unwrap();
        resolver.approve(&mut record).await.unwrap();
        resolver.approve(&mut record).await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_approve_requires_fill() {
        let resolver = resolver(FakeRunner::new(), FakePrompter::unavailable());
        let mut record = record(&["a"]);
        let err = resolver.approve(&mut record).await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::InvalidState {
                operation: "approve",
                state: CredentialState::Empty
            }
        ));
    }

    #[tokio::test]
    async fn test_reject_erases_and_keeps_context() {
        let runner = FakeRunner::new()
            .respond(&helper("a"), "username=alice\npassword=pw\n")
            .with(&helper("b"), FakeResponse::SpawnError);
        let calls = runner.calls.clone();
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["a", "b", "c"]);

        resolver.fill(&mut record).await.unwrap();
        resolver.reject(&mut record).await.unwrap();

        assert_eq!(record.state(), CredentialState::Rejected);
        assert!(record.username.is_none());
        assert!(record.password.is_none());
        assert_eq!(record.protocol.as_deref(), Some("https"));
        assert_eq!(record.host.as_deref(), Some("example.com"));
        assert_eq!(record.path.as_deref(), Some("/repo.git"));

        let erases = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == Operation::Erase)
            .count();
        assert_eq!(erases, 3);
    }

    #[tokio::test]
    async fn test_refill_after_reject() {
        let runner = FakeRunner::new().respond(&helper("a"), "username=alice\npassword=pw\n");
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["a"]);

        resolver.fill(&mut record).await.unwrap();
        resolver.reject(&mut record).await.unwrap();
        resolver.fill(&mut record).await.unwrap();
        assert_eq!(record.state(), CredentialState::Filled);
        assert!(record.has_credentials());
    }

    #[tokio::test]
    async fn test_reject_requires_fill() {
        let resolver = resolver(FakeRunner::new(), FakePrompter::unavailable());
        let mut record = record(&[]);
        assert!(resolver.reject(&mut record).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_disposes_record() {
        let runner = FakeRunner::new().respond(&helper("a"), "username=alice\npassword=pw\n");
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["a"]);

        resolver.fill(&mut record).await.unwrap();
        resolver.clear(&mut record);

        assert_eq!(record.state(), CredentialState::Disposed);
        assert!(record.helpers.is_empty());
        assert!(record.host.is_none());
        assert!(record.password.is_none());
        assert!(matches!(
            resolver.fill(&mut record).await,
            Err(CredentialError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_record_can_be_filled_again() {
        let runner = FakeRunner::new().respond(&helper("a"), "username=alice\npassword=pw\n");
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["a"]);

        resolver.fill(&mut record).await.unwrap();
        resolver.clear(&mut record);
        record.reset();
        assert_eq!(record.state(), CredentialState::Empty);

        record.protocol = Some("https".to_string());
        record.host = Some("example.com".to_string());
        record.helpers = vec!["a".to_string()];
        resolver.fill(&mut record).await.unwrap();
        assert_eq!(record.get(Field::Password), Some("pw"));
    }

    #[tokio::test]
    async fn test_abandoned_fill_rolls_back() {
        let runner = FakeRunner::new()
            .respond(&helper("a"), "username=alice\npassword=pw1\n")
            .with(&helper("b"), FakeResponse::Hang);
        let resolver = resolver(runner, FakePrompter::unavailable());
        let mut record = record(&["a", "b"]);

        let result =
            tokio::time::timeout(Duration::from_millis(100), resolver.fill(&mut record)).await;
        assert!(result.is_err());
        assert_eq!(record.state(), CredentialState::Empty);
        assert!(record.username.is_none());
        assert!(record.password.is_none());
        assert_eq!(record.host.as_deref(), Some("example.com"));

        record.helpers = vec!["a".to_string()];
        resolver.fill(&mut record).await.unwrap();
        assert_eq!(record.get(Field::Password), Some("pw1"));
    }
}
