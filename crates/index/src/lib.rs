//! In-memory auxiliary indexes layered over the EUFF file: the sharded
//! tag index and its variant cache, the per-entity temporal timeline, the
//! namespace index, a persisted snapshot of the tag index, and the
//! per-entity/writer locking primitives the repository coordinates them
//! through.
//!
//! Nothing here touches the file directly — `entity-engine` owns reading
//! and writing the EUFF sections these indexes describe.

pub mod lock_manager;
pub mod namespace_index;
pub mod sharded_tag_index;
pub mod snapshot;
pub mod tag_index;
pub mod temporal_index;
pub mod variant_cache;

pub use lock_manager::{EntityLockManager, WriterLock};
pub use namespace_index::NamespaceIndex;
pub use sharded_tag_index::ShardedTagIndex;
pub use snapshot::TagIndexSnapshot;
pub use tag_index::TagIndex;
pub use temporal_index::{TemporalEntry, TemporalIndex};
pub use variant_cache::VariantCache;
