//! EUFF format constants.

/// Magic bytes identifying an EUFF file: "EUFF" read little-endian as u32.
pub const EUFF_MAGIC: u32 = 0x4555_4646;

/// Current format version emitted by writers.
pub const CURRENT_VERSION: u32 = 3;

/// Format versions a reader will accept.
pub const COMPATIBLE_VERSIONS: &[u32] = &[2, 3];

/// Fixed on-disk header size in bytes.
pub const HEADER_SIZE: usize = 128;

/// Fixed on-disk index entry size in bytes.
pub const INDEX_ENTRY_SIZE: usize = 112;

/// Fixed on-disk deletion entry size in bytes.
pub const DELETION_ENTRY_SIZE: usize = 256;

/// Corruption ratio above which a reader surfaces a warning and triggers
/// automatic recovery.
pub const CORRUPTION_RATIO_THRESHOLD: f64 = 0.10;

/// Fixed space reserved for the WAL section in a fresh file, so the data
/// section that follows it has a stable starting offset. The WAL section
/// itself still tracks its own logical `size` within this reservation;
/// growing past it is avoided in practice by checkpointing well before
/// this capacity is reached (the default checkpoint threshold is well
/// under this reservation).
pub const WAL_RESERVED_BYTES: u64 = 256 * 1024 * 1024;
