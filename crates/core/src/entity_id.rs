//! Entity identifiers.
//!
//! Conventionally a UUID, optionally prefixed (e.g. `dataset:uuid`).
//! Stored on disk as a 96-byte null-padded field; this type only carries the
//! validated logical string — padding/truncation is a concern of
//! `entity-format`.

use crate::error::{Error, Result};
use crate::limits::MAX_ID_LEN;
use std::fmt;
use uuid::Uuid;

/// A validated entity identifier, at most [`MAX_ID_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(String);

impl EntityId {
    /// Validate and wrap an existing id string.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(Error::validation("entity id must not be empty"));
        }
        if raw.len() > MAX_ID_LEN {
            return Err(Error::validation(format!(
                "entity id exceeds {MAX_ID_LEN} bytes: {} bytes",
                raw.len()
            )));
        }
        Ok(EntityId(raw))
    }

    /// Generate a fresh random UUID id.
    pub fn generate() -> Self {
        EntityId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_valid_id() {
        let id = EntityId::generate();
        assert!(EntityId::parse(id.as_str().to_string()).is_ok());
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(EntityId::parse("").is_err());
    }

    #[test]
    fn parse_rejects_oversize() {
        let huge = "x".repeat(MAX_ID_LEN + 1);
        assert!(EntityId::parse(huge).is_err());
    }

    #[test]
    fn parse_accepts_prefixed_id() {
        let id = EntityId::parse("dataset:1234").unwrap();
        assert_eq!(id.as_str(), "dataset:1234");
    }
}
