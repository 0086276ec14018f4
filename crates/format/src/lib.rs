//! Binary codec for the EUFF (Entity Unified File Format) single-file layout:
//!
//! ```text
//! [Header 128 B][WAL section][Data section][Tag dictionary][Entity index][Deletion index]
//! ```
//!
//! Every module here is a pure encode/decode layer with no file-handle or
//! locking concerns — those live in `entity-wal`, `entity-index`, and
//! `entity-engine`.

pub mod constants;
pub mod content_codec;
pub mod deletion_entry;
pub mod entity_block;
pub mod header;
pub mod index_entry;
pub mod padded_id;
pub mod tag_dictionary;

pub use constants::{
    COMPATIBLE_VERSIONS, CORRUPTION_RATIO_THRESHOLD, CURRENT_VERSION, DELETION_ENTRY_SIZE,
    EUFF_MAGIC, HEADER_SIZE, INDEX_ENTRY_SIZE,
};
pub use deletion_entry::{DeletionEntry, LifecycleState};
pub use header::Header;
pub use index_entry::{index_flags, IndexEntry};
pub use tag_dictionary::TagDictionary;
