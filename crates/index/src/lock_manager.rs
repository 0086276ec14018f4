//! Per-entity read/write locks and the single-writer coordination lock.
//!
//! Locks are created lazily and never evicted — their count is bounded by
//! the live entity id space, the same lifetime as the entity map itself.

use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// One `RwLock<()>` per entity id. Callers acquire the returned `Arc` and
/// lock it themselves, so the guard's lifetime is tied to the `Arc` they
/// hold, not to this manager.
#[derive(Default)]
pub struct EntityLockManager {
    locks: RwLock<HashMap<String, Arc<RwLock<()>>>>,
}

impl EntityLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, id: &str) -> Arc<RwLock<()>> {
        if let Some(lock) = self.locks.read().get(id) {
            return lock.clone();
        }
        self.locks
            .write()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Locks for a multi-entity batch write, returned in sorted id order
    /// so callers who lock them in the returned order and release in
    /// reverse avoid deadlock. Duplicate ids collapse to one lock.
    pub fn locks_for_batch(&self, ids: &[String]) -> Vec<Arc<RwLock<()>>> {
        let mut sorted: Vec<&String> = ids.iter().collect();
        sorted.sort();
        sorted.dedup();
        sorted.into_iter().map(|id| self.lock_for(id)).collect()
    }
}

/// Serializes physical writes to the data file and checkpoint operations:
/// the single-writer discipline from spec §4.3.
#[derive(Default)]
pub struct WriterLock(Mutex<()>);

impl WriterLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock()
    }
}
