//! The credential record that flows through a helper chain

use crate::codec::Attribute;
use crate::{CredentialError, Result, Secret};
use std::fmt;
use zeroize::Zeroize;

/// Lifecycle of a [`CredentialRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialState {
    #[default]
    Empty,
    Filling,
    Filled,
    Approved,
    Rejected,
    Disposed,
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialState::Empty => "empty",
            CredentialState::Filling => "filling",
            CredentialState::Filled => "filled",
            CredentialState::Approved => "approved",
            CredentialState::Rejected => "rejected",
            CredentialState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// A field that travels over the helper wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Protocol,
    Host,
    Path,
    Username,
    Password,
}

impl Field {
    /// Wire order
    pub const ALL: [Field; 5] = [
        Field::Protocol,
        Field::Host,
        Field::Path,
        Field::Username,
        Field::Password,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::Protocol => "protocol",
            Field::Host => "host",
            Field::Path => "path",
            Field::Username => "username",
            Field::Password => "password",
        }
    }
}

/// Context and secrets for one authentication attempt.
///
/// Callers set the context fields (protocol, host, path, optionally a
/// username) and the helper chain, then hand the record to a
/// [`Resolver`](crate::Resolver). Everything is wiped on drop.
#[derive(Default)]
pub struct CredentialRecord {
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub path: Option<String>,
    pub username: Option<String>,
    pub password: Option<Secret>,
    /// Helper specifiers, consulted in order
    pub helpers: Vec<String>,
    quit: bool,
    state: CredentialState,
}

impl CredentialRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty record for `protocol://host`
    pub fn with_context(protocol: impl Into<String>, host: impl Into<String>) -> Self {
        let mut record = Self::new();
        record.protocol = Some(protocol.into());
        record.host = Some(host.into());
        record
    }

    pub fn state(&self) -> CredentialState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: CredentialState) {
        self.state = state;
    }

    /// True once a helper asked the chain to stop
    pub fn quit(&self) -> bool {
        self.quit
    }

    pub(crate) fn reset_quit(&mut self) {
        self.quit = false;
    }

    pub fn set_password(&mut self, password: impl Into<Secret>) {
        self.password = Some(password.into());
    }

    /// Both username and password are present
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Protocol => self.protocol.as_deref(),
            Field::Host => self.host.as_deref(),
            Field::Path => self.path.as_deref(),
            Field::Username => self.username.as_deref(),
            Field::Password => self.password.as_ref().map(Secret::expose),
        }
    }

    /// Overwrite the field named by `attribute`.
    ///
    /// `url` is decomposed and every component it carries is overwritten.
    /// `quit` raises the quit flag. Unknown keys are ignored.
    pub fn apply(&mut self, attribute: &Attribute) {
        let value = attribute.value.as_str();
        match attribute.key.as_str() {
            "protocol" => replace(&mut self.protocol, value),
            "host" => replace(&mut self.host, value),
            "path" => replace(&mut self.path, value),
            "username" => replace(&mut self.username, value),
            "password" => self.set_password(value),
            "url" => match CredentialRecord::from_url(value) {
                Ok(mut parsed) => self.merge_from(&mut parsed),
                Err(e) => tracing::warn!("Ignoring unparseable url attribute: {}", e),
            },
            "quit" => self.quit = is_truthy(value),
            other => tracing::trace!("Ignoring unknown credential attribute {:?}", other),
        }
    }

    /// Move every present field of `other` into `self`
    fn merge_from(&mut self, other: &mut CredentialRecord) {
        for (slot, incoming) in [
            (&mut self.protocol, &mut other.protocol),
            (&mut self.host, &mut other.host),
            (&mut self.path, &mut other.path),
            (&mut self.username, &mut other.username),
        ] {
            if incoming.is_some() {
                slot.zeroize();
                *slot = incoming.take();
            }
        }
        if other.password.is_some() {
            self.password = other.password.take();
        }
    }

    /// Wipe username and password, keeping protocol, host, path and helpers
    pub fn clear_secrets(&mut self) {
        self.username.zeroize();
        self.password.zeroize();
    }

    /// Wipe every field and release the helper list
    pub fn wipe(&mut self) {
        self.clear_secrets();
        self.protocol.zeroize();
        self.host.zeroize();
        self.path.zeroize();
        self.helpers.zeroize();
        self.quit = false;
        self.state = CredentialState::Disposed;
    }

    /// Wipe every field and make the record fillable again.
    ///
    /// Context fields and helpers must be set again before the next fill.
    pub fn reset(&mut self) {
        self.wipe();
        self.state = CredentialState::Empty;
    }

    /// Treat a record that arrived with both username and password (for
    /// example read back from a caller) as filled, so it can be approved or
    /// rejected.
    pub fn adopt_filled(&mut self) -> Result<()> {
        match self.state {
            CredentialState::Empty | CredentialState::Rejected => {}
            state => {
                return Err(CredentialError::InvalidState {
                    operation: "adopt",
                    state,
                })
            }
        }
        if !self.has_credentials() {
            return Err(CredentialError::Incomplete(self.describe()));
        }
        self.state = CredentialState::Filled;
        Ok(())
    }

    /// `protocol://[username@]host[/path]`, never including the password
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if let Some(ref protocol) = self.protocol {
            out.push_str(protocol);
            out.push_str("://");
        }
        if let Some(ref username) = self.username {
            out.push_str(username);
            out.push('@');
        }
        if let Some(ref host) = self.host {
            out.push_str(host);
        }
        if let Some(ref path) = self.path {
            if !path.starts_with('/') {
                out.push('/');
            }
            out.push_str(path);
        }
        out
    }
}

// Helper specifiers may embed secrets in shell snippets, so only their count is shown
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("path", &self.path)
            .field("username", &self.username)
            .field("password", &self.password)
            .field("helpers", &self.helpers.len())
            .field("quit", &self.quit)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for CredentialRecord {
    fn drop(&mut self) {
        self.wipe();
    }
}

fn replace(slot: &mut Option<String>, value: &str) {
    slot.zeroize();
    *slot = Some(value.to_string());
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
