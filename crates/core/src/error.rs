//! Error types for the EUFF entity engine.
//!
//! We use `thiserror` for automatic `Display`/`Error` impls, same as the
//! rest of the workspace.
//!
//! Error categories:
//! - `Validation` — bad input.
//! - `NotFound` — entity absent from index and disk.
//! - `Integrity` — checksum mismatch, offset out of range, astronomical size.
//! - `Corruption` — index/data inconsistency; triggers automatic recovery.
//! - `Io` — underlying filesystem error.
//! - `FormatVersion` — unsupported file version.
//! - `Conflict` — duplicate id on create, or tag already present.
//! - `Cancelled` — operation aborted before WAL append.

use std::io;
use thiserror::Error;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all EUFF engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input: empty id, oversize content/tags, malformed tag.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Entity absent from both the index and the data file.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// Checksum mismatch, offset out of range, astronomical size, invalid header.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Index/data inconsistency detected; triggers automatic recovery.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unsupported EUFF file version.
    #[error("unsupported format version: {0}")]
    FormatVersion(u32),

    /// Duplicate id on create, or tag already present on add.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation aborted before the WAL append stage.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// Validation and conflict errors never mutated state and are safe to
    /// retry after the caller fixes the input.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Conflict(_))
    }

    /// Integrity and corruption errors may resolve themselves after an
    /// automatic recovery pass; callers can retry once without fixing input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Corruption(_) | Error::Integrity(_))
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Error::NotFound(id.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Error::Integrity(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_are_validation_and_conflict_only() {
        assert!(Error::validation("bad").is_caller_error());
        assert!(Error::conflict("dup").is_caller_error());
        assert!(!Error::corruption("x").is_caller_error());
        assert!(!Error::not_found("id").is_caller_error());
    }

    #[test]
    fn recoverable_errors_are_corruption_and_integrity_only() {
        assert!(Error::corruption("x").is_recoverable());
        assert!(Error::integrity("x").is_recoverable());
        assert!(!Error::validation("x").is_recoverable());
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn display_messages_are_descriptive() {
        let err = Error::FormatVersion(99);
        assert_eq!(err.to_string(), "unsupported format version: 99");
    }
}
