//! Helper wire format
//!
//! One `key=value` pair per line, terminated by a blank line or end of
//! stream. Keys exclude `=`, newline and NUL; values exclude newline and NUL.
//! Nothing is escaped.

use crate::{CredentialRecord, DecodeError, Field};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// One `key=value` pair. The value is wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.key == "password" {
            "[REDACTED]"
        } else {
            self.value.as_str()
        };
        write!(f, "{}={}", self.key, value)
    }
}

/// Serialize the present `fields` of `record` in wire order.
pub fn encode(record: &CredentialRecord, fields: &[Field]) -> Zeroizing<String> {
    let mut out = Zeroizing::new(String::new());
    for field in Field::ALL {
        if !fields.contains(&field) {
            continue;
        }
        if let Some(value) = record.get(field) {
            out.push_str(field.key());
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
    }
    out.push('\n');
    out
}

/// Parse attributes up to the first blank line.
///
/// Lines without `=` are skipped so that unknown future line formats do not
/// break older readers.
pub fn decode(input: &[u8]) -> Result<Vec<Attribute>, DecodeError> {
    let text = std::str::from_utf8(input).map_err(|_| DecodeError::InvalidUtf8)?;
    let mut attributes = Vec::new();

    for (index, line) in text.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            break;
        }
        if line.contains('\0') {
            return Err(DecodeError::Nul(index + 1));
        }
        match line.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                attributes.push(Attribute::new(key, value));
            }
            _ => tracing::trace!("Skipping helper output line {} without a key", index + 1),
        }
    }

    Ok(attributes)
}
