//! Write-ahead log embedded in the EUFF file's WAL section.
//!
//! Every mutation is appended here before it is reflected in the entity
//! data section, so a crash between the two always leaves a WAL that can
//! replay forward to the correct state.

pub mod entry;
pub mod log;
pub mod op_type;

pub use entry::{EntityPayload, WalEntry};
pub use log::Wal;
pub use op_type::OpType;
