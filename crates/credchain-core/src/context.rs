//! Applying configuration to a record before it is filled

use crate::CredentialRecord;
use credchain_config::CredentialConfig;

/// Set up `record` from `config`:
/// - the global helper chain followed by the helpers of every matching
///   context, ahead of any helpers the caller already put on the record
/// - a default username when the caller gave none
/// - drop the path of http/https URLs unless `use_http_path` is set
///
/// Contexts are matched against the record as given, before the path is
/// dropped.
pub fn apply_config(record: &mut CredentialRecord, config: &CredentialConfig) {
    let mut helpers = config.helpers.clone();
    let mut username = config.username.clone();
    let mut use_http_path = config.use_http_path;

    for context in &config.contexts {
        let pattern = match CredentialRecord::from_url(&context.url) {
            Ok(pattern) => pattern,
            Err(e) => {
                tracing::warn!("Skipping credential context with invalid url: {}", e);
                continue;
            }
        };
        if !context_matches(&pattern, record) {
            continue;
        }
        tracing::debug!("Credential context {} matches", pattern.describe());
        helpers.extend(context.helpers.iter().cloned());
        if context.username.is_some() {
            username = context.username.clone();
        }
        if let Some(value) = context.use_http_path {
            use_http_path = value;
        }
    }

    helpers.append(&mut record.helpers);
    record.helpers = helpers;

    if record.username.is_none() {
        record.username = username;
    }

    let is_http = matches!(record.protocol.as_deref(), Some("http") | Some("https"));
    if is_http && !use_http_path {
        record.path = None;
    }
}

/// Protocol and host must be equal; a username or path on the pattern must
/// match too (the path as a prefix).
pub fn context_matches(pattern: &CredentialRecord, record: &CredentialRecord) -> bool {
    if pattern.protocol != record.protocol {
        return false;
    }
    let hosts_equal = match (&pattern.host, &record.host) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    };
    if !hosts_equal {
        return false;
    }
    if let Some(ref wanted) = pattern.username {
        if record.username.as_ref() != Some(wanted) {
            return false;
        }
    }
    if let Some(ref prefix) = pattern.path {
        let prefix = prefix.trim_matches('/');
        let path = record.path.as_deref().unwrap_or_default().trim_matches('/');
        if path != prefix && !path.starts_with(&format!("{}/", prefix)) {
            return false;
        }
    }
    true
}
