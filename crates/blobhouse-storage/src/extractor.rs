//! Key Extractors
//!
//! A key extractor maps a record's raw bytes to the string key it is indexed
//! under. Three variants cover the common shapes of newline-delimited data:
//!
//! - [`RegexExtractor`]: the first pattern match is the key. Never fails; a
//!   record without a match gets the empty string.
//! - [`FieldExtractor`]: parses the record as a JSON object and renders a
//!   configured top-level field to a string.
//! - [`ToplevelExtractor`]: parses a JSON object whose payload is nested
//!   under a single top-level key, e.g. `{"id-1": {"name": "alice"}}`, and
//!   returns that key's name.
//!
//! The pipeline treats all variants uniformly through the [`KeyExtractor`]
//! trait; extraction is pure per record, which is what makes the parallel
//! pipeline deterministic.

use regex::bytes::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

/// Extracts a string key from a record's bytes.
pub trait KeyExtractor: Send + Sync {
    fn extract_key(&self, record: &[u8]) -> Result<String>;
}

/// Extracts a key via regular expression match.
#[derive(Debug, Clone)]
pub struct RegexExtractor {
    pattern: Regex,
}

impl RegexExtractor {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl KeyExtractor for RegexExtractor {
    /// Returns the first match, or the empty string when nothing matches.
    /// Never fails, just might return unexpected values.
    fn extract_key(&self, record: &[u8]) -> Result<String> {
        Ok(self
            .pattern
            .find(record)
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
            .unwrap_or_default())
    }
}

/// Parses the record as JSON and extracts a top-level field.
///
/// Slower than a regular expression, but exact.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    field: String,
}

impl FieldExtractor {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl KeyExtractor for FieldExtractor {
    fn extract_key(&self, record: &[u8]) -> Result<String> {
        let doc: Value = serde_json::from_slice(record)
            .map_err(|e| Error::Extractor(format!("invalid JSON document: {e}")))?;
        let obj = doc
            .as_object()
            .ok_or_else(|| Error::Extractor("document is not a JSON object".into()))?;
        let value = obj.get(&self.field).ok_or_else(|| {
            Error::Extractor(format!(
                "key {} not found in: {}",
                self.field,
                String::from_utf8_lossy(record).trim()
            ))
        })?;
        render_string(value)
    }
}

/// Returns the name of the record's single top-level key.
#[derive(Debug, Clone, Default)]
pub struct ToplevelExtractor;

impl KeyExtractor for ToplevelExtractor {
    fn extract_key(&self, record: &[u8]) -> Result<String> {
        let doc: Value = serde_json::from_slice(record)
            .map_err(|e| Error::Extractor(format!("invalid JSON document: {e}")))?;
        let obj = doc
            .as_object()
            .ok_or_else(|| Error::Extractor("document is not a JSON object".into()))?;
        obj.keys().next().cloned().ok_or_else(|| {
            Error::Extractor(format!(
                "no top level key: {}",
                String::from_utf8_lossy(record).trim()
            ))
        })
    }
}

/// Render a JSON value to a key string.
///
/// Strings pass through verbatim (RFC 3339 timestamps arrive as strings and
/// keep their form), integers render decimally, floats keep only the integer
/// part. Everything else is not a usable key.
fn render_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Ok(u.to_string())
            } else {
                // Truncate toward zero, mirroring integer formatting of floats.
                Ok((n.as_f64().unwrap_or_default() as i64).to_string())
            }
        }
        other => Err(Error::Extractor(format!(
            "unsupported key type: {other}"
        ))),
    }
}
