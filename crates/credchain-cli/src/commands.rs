//! CLI command implementations
//!
//! `fill`, `approve` and `reject` read a credential in wire format from
//! `input`; `fill` writes the completed credential back to `output`.

use anyhow::{Context, Result};
use credchain_config::{CredentialConfig, GlobalConfig};
use credchain_core::{apply_config, codec, CredentialRecord, Field, Resolver};
use std::io::{BufRead, Write};
use zeroize::Zeroizing;

/// Read attributes up to the first blank line (or EOF) into a record.
///
/// Stops at the blank line so a caller may keep the pipe open.
pub fn read_record<R: BufRead>(input: &mut R) -> Result<CredentialRecord> {
    let mut raw = Zeroizing::new(Vec::new());
    let mut line = Zeroizing::new(Vec::new());
    loop {
        line.clear();
        let n = input
            .read_until(b'\n', &mut line)
            .context("Failed to read credential from stdin")?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&line);
        if line.as_slice() == b"\n" || line.as_slice() == b"\r\n" {
            break;
        }
    }

    let attributes = codec::decode(&raw).context("Malformed credential on stdin")?;
    let mut record = CredentialRecord::new();
    for attribute in &attributes {
        record.apply(attribute);
    }
    Ok(record)
}

/// Build the record for one command: stdin context, extra helpers, config
fn prepare<R: BufRead>(
    config: &CredentialConfig,
    extra_helpers: &[String],
    input: &mut R,
) -> Result<CredentialRecord> {
    let mut record = read_record(input)?;
    record.helpers = extra_helpers.to_vec();
    apply_config(&mut record, config);
    Ok(record)
}

/// Fill a credential and print it
pub async fn fill<R: BufRead, W: Write>(
    resolver: &Resolver,
    config: &CredentialConfig,
    extra_helpers: &[String],
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let mut record = prepare(config, extra_helpers, input)?;
    resolver.fill(&mut record).await?;

    let encoded = codec::encode(&record, &Field::ALL);
    output.write_all(encoded.as_bytes())?;
    output.flush()?;
    resolver.clear(&mut record);
    Ok(())
}

/// Tell the helper chain a credential worked
pub async fn approve<R: BufRead>(
    resolver: &Resolver,
    config: &CredentialConfig,
    extra_helpers: &[String],
    input: &mut R,
) -> Result<()> {
    let mut record = prepare(config, extra_helpers, input)?;
    record.adopt_filled()?;
    resolver.approve(&mut record).await?;
    tracing::debug!("Approved credential for {}", record.describe());
    Ok(())
}

/// Tell the helper chain a credential failed
pub async fn reject<R: BufRead>(
    resolver: &Resolver,
    config: &CredentialConfig,
    extra_helpers: &[String],
    input: &mut R,
) -> Result<()> {
    let mut record = prepare(config, extra_helpers, input)?;
    record.adopt_filled()?;
    resolver.reject(&mut record).await?;
    tracing::debug!("Rejected credential for {}", record.describe());
    Ok(())
}

/// Show the config location and the helper chain, optionally for `url`
pub fn config<W: Write>(
    global: &GlobalConfig,
    url: Option<&str>,
    extra_helpers: &[String],
    output: &mut W,
) -> Result<()> {
    let path = GlobalConfig::config_path()?;
    let status = if path.exists() { "" } else { " (not found, using defaults)" };
    writeln!(output, "Config file: {}{}", path.display(), status)?;

    let mut record = match url {
        Some(url) => CredentialRecord::from_url(url).context("Invalid URL")?,
        None => CredentialRecord::new(),
    };
    record.helpers = extra_helpers.to_vec();
    apply_config(&mut record, &global.credential);

    let target = if url.is_some() {
        record.describe()
    } else {
        "any URL".to_string()
    };
    writeln!(output, "Helper prefix: {}", global.credential.helper_prefix)?;
    writeln!(output, "Interactive prompt: {}", global.credential.interactive)?;
    if record.helpers.is_empty() {
        writeln!(output, "No credential helpers configured for {}", target)?;
    } else {
        writeln!(output, "Helpers for {}:", target)?;
        for (i, helper) in record.helpers.iter().enumerate() {
            writeln!(output, "  {}. {}", i + 1, helper)?;
        }
    }
    Ok(())
}
