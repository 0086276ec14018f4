//! Hard size limits enforced across the engine.
//!
//! These are invariants of the EUFF format, not tunables — configuration
//! knobs live in `entity-api::config`.

/// Maximum content blob size: 1 GiB.
pub const MAX_CONTENT_BYTES: u64 = 1 << 30;

/// Maximum number of tags on a single entity.
pub const MAX_TAG_COUNT: usize = 10_000;

/// Maximum length of an entity id (before null-padding to the on-disk 96 bytes).
pub const MAX_ID_LEN: usize = 64;

/// On-disk width of the entity id field in the index/entity block.
pub const ID_FIELD_WIDTH: usize = 96;

/// Sizes or offsets at or above this are treated as corrupt input rather than
/// merely "too large" — the WAL and writer both refuse to act on them.
/// Chosen as 1 GB, matching the content cap with headroom for framing bytes.
pub const ASTRONOMICAL_SIZE: u64 = 1_000_000_000;

/// Default compression threshold: content smaller than this is always
/// stored raw regardless of whether gzip would shrink it.
pub const DEFAULT_COMPRESSION_THRESHOLD_BYTES: usize = 1024;
