//! Global configuration for credchain
//!
//! Located at `~/.config/credchain/config.toml`, or wherever
//! `CREDCHAIN_CONFIG` points.

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "CREDCHAIN_CONFIG";

/// Global credchain configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub credential: CredentialConfig,
}

/// Settings for the credential helper chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Helper specifiers, consulted in order
    pub helpers: Vec<String>,
    /// Prefix prepended to bare helper names ("store" -> "git-credential-store")
    pub helper_prefix: String,
    /// Shell used for `!` helper snippets
    pub shell: String,
    /// Default username when the caller did not supply one
    pub username: Option<String>,
    /// Send the path of http/https URLs to helpers (default: false)
    pub use_http_path: bool,
    /// Fall back to an interactive prompt when helpers come up empty
    pub interactive: bool,
    /// Kill a helper that runs longer than this. No limit when unset.
    pub helper_timeout_secs: Option<u64>,
    /// URL-scoped overrides, applied in file order
    #[serde(rename = "context")]
    pub contexts: Vec<ContextConfig>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            helpers: Vec::new(),
            helper_prefix: "git-credential-".to_string(),
            shell: default_shell(),
            username: None,
            use_http_path: false,
            interactive: true,
            helper_timeout_secs: None,
            contexts: Vec::new(),
        }
    }
}

impl CredentialConfig {
    /// The helper timeout as a `Duration`, if one is configured
    pub fn helper_timeout(&self) -> Option<Duration> {
        self.helper_timeout_secs.map(Duration::from_secs)
    }
}

/// Settings that only apply to credentials matching `url`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// URL pattern, e.g. `https://github.com` or `https://bob@example.com/team`
    pub url: String,
    /// Helpers appended after the global chain
    pub helpers: Vec<String>,
    pub username: Option<String>,
    pub use_http_path: Option<bool>,
}

#[cfg(windows)]
fn default_shell() -> String {
    "sh".to_string()
}

#[cfg(not(windows))]
fn default_shell() -> String {
    "/bin/sh".to_string()
}

impl GlobalConfig {
    /// Load global configuration from the default path
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load global configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.clone(),
            source: e,
        })?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {:?}: {} helpers, {} contexts",
            path,
            config.credential.helpers.len(),
            config.credential.contexts.len()
        );

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.clone(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the config file path, honoring `CREDCHAIN_CONFIG`
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        let dirs = ProjectDirs::from("", "", "credchain").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Check if the config file exists on disk
    pub fn config_exists() -> bool {
        Self::config_path()
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    fn validate(&self) -> Result<()> {
        let cred = &self.credential;
        if cred.helper_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "credential.helper_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if cred.shell.trim().is_empty() {
            return Err(ConfigError::Invalid("credential.shell must not be empty".to_string()));
        }
        if let Some(ctx) = cred.contexts.iter().find(|c| c.url.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "credential context with helpers {:?} has no url",
                ctx.helpers
            )));
        }
        Ok(())
    }
}
