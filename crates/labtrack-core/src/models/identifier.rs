//! Human-readable order identifiers.
//!
//! Sequential form: `<PREFIX>-<YYYY>-<MM>-<DD>-<SSS>`, where `SSS` is the
//! same-day sequence zero-padded to three digits. Sequences past 999 are
//! printed in full.
//!
//! Fallback form: `<PREFIX>-<epoch-millis>-<6 hex>`, used when the store
//! cannot be read at allocation time.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "LAB";

/// Minimum width of the sequence suffix.
pub const SEQUENCE_WIDTH: usize = 3;

/// Identifier errors.
#[derive(Error, Debug, PartialEq)]
pub enum IdentifierError {
    #[error("Malformed sequence suffix {suffix:?} in identifier {identifier}")]
    MalformedSuffix { identifier: String, suffix: String },
}

/// An order identifier as stored and shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderIdentifier(String);

impl OrderIdentifier {
    /// Build a sequential identifier for a calendar day.
    pub fn sequential(prefix: &str, day: NaiveDate, sequence: u32) -> Self {
        Self(format!(
            "{}-{:0width$}",
            day_prefix(prefix, day),
            sequence,
            width = SEQUENCE_WIDTH
        ))
    }

    /// Build a timestamp-derived identifier.
    ///
    /// Unique as long as two fallbacks minted in the same millisecond do not
    /// draw the same 24 random bits.
    pub fn fallback(prefix: &str, at: DateTime<Utc>) -> Self {
        let entropy = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}-{}", prefix, at.timestamp_millis(), &entropy[..6]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sequence number of this identifier under a day prefix.
    ///
    /// Returns `Ok(None)` when the identifier belongs to another day (or is a
    /// fallback identifier), and an error when it carries the day prefix but
    /// the suffix is not a number.
    pub fn sequence_under(&self, base: &str) -> Result<Option<u32>, IdentifierError> {
        let Some(suffix) = self
            .0
            .strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('-'))
        else {
            return Ok(None);
        };

        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.malformed(suffix));
        }
        suffix
            .parse::<u32>()
            .map(Some)
            .map_err(|_| self.malformed(suffix))
    }

    fn malformed(&self, suffix: &str) -> IdentifierError {
        IdentifierError::MalformedSuffix {
            identifier: self.0.clone(),
            suffix: suffix.to_string(),
        }
    }
}

impl fmt::Display for OrderIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OrderIdentifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The `<PREFIX>-<YYYY>-<MM>-<DD>` part shared by every identifier of a day.
pub fn day_prefix(prefix: &str, day: NaiveDate) -> String {
    format!("{}-{}", prefix, day.format("%Y-%m-%d"))
}
