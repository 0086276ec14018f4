//! Temporal tags: `"<unix_nanos>|<tag_body>"`.
//!
//! Every tag persisted by the engine matches this shape.
//! Callers may pass a bare, non-temporal tag body to the repository; it is
//! the repository's job (not this type's) to stamp it with the current
//! timestamp via [`Tag::wrap`].

use crate::error::{Error, Result};
use std::fmt;

/// A single temporal tag, always of the form `"<nanos>|<body>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(String);

impl Tag {
    /// Wrap a plain tag body with a timestamp prefix.
    pub fn wrap(body: impl AsRef<str>, nanos: u64) -> Self {
        Tag(format!("{}|{}", nanos, body.as_ref()))
    }

    /// Parse an already-temporal tag string, validating the `nanos|body` shape.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let (ts_part, body) = raw
            .split_once('|')
            .ok_or_else(|| Error::validation(format!("tag missing temporal prefix: {raw:?}")))?;
        if body.is_empty() {
            return Err(Error::validation("tag body must not be empty"));
        }
        ts_part
            .parse::<u64>()
            .map_err(|_| Error::validation(format!("tag has non-numeric timestamp: {raw:?}")))?;
        Ok(Tag(raw))
    }

    /// Full temporal key, e.g. `"1700000000000000000|status:active"`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The timestamp prefix, in nanoseconds.
    pub fn timestamp_nanos(&self) -> u64 {
        self.0
            .split_once('|')
            .and_then(|(ts, _)| ts.parse().ok())
            .expect("Tag invariant: always has a valid numeric prefix")
    }

    /// The tag body (everything after the first `|`).
    pub fn body(&self) -> &str {
        self.0
            .split_once('|')
            .map(|(_, body)| body)
            .expect("Tag invariant: always has a body")
    }

    /// The namespace: the portion of the body before its first `:`, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.body().split_once(':').map(|(ns, _)| ns)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the namespace (prefix before the first `:`) of a clean tag body.
pub fn namespace_of(body: &str) -> Option<&str> {
    body.split_once(':').map(|(ns, _)| ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_produces_parseable_tag() {
        let tag = Tag::wrap("status:active", 42);
        assert_eq!(tag.as_str(), "42|status:active");
        assert_eq!(tag.timestamp_nanos(), 42);
        assert_eq!(tag.body(), "status:active");
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert!(Tag::parse("status:active").is_err());
    }

    #[test]
    fn parse_rejects_non_numeric_prefix() {
        assert!(Tag::parse("abc|status:active").is_err());
    }

    #[test]
    fn parse_rejects_empty_body() {
        assert!(Tag::parse("42|").is_err());
    }

    #[test]
    fn namespace_extraction() {
        let tag = Tag::wrap("content:type:image/png", 1);
        assert_eq!(tag.namespace(), Some("content"));
        let plain = Tag::wrap("standalone", 1);
        assert_eq!(plain.namespace(), None);
    }

    #[test]
    fn namespace_of_helper_matches_tag_namespace() {
        assert_eq!(namespace_of("type:user"), Some("type"));
        assert_eq!(namespace_of("checksum:sha256:abc"), Some("checksum"));
        assert_eq!(namespace_of("bare"), None);
    }
}
