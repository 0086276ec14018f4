//! Checkpoint trigger bookkeeping (spec §4.9).
//!
//! The manager only decides *when*; the repository carries out the
//! persist-dirty/sync/truncate-WAL steps themselves, since those need the
//! writer, WAL, and cache all at once.

use crate::config::CheckpointThresholds;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

pub struct CheckpointManager {
    thresholds: CheckpointThresholds,
    ops_since_checkpoint: AtomicU64,
    last_checkpoint: Mutex<Instant>,
    sequence: AtomicU64,
}

impl CheckpointManager {
    pub fn new(thresholds: CheckpointThresholds) -> Self {
        Self::new_with_sequence(thresholds, 0)
    }

    /// Resume counting from a checkpoint sequence persisted in a file's
    /// header, so reopening a file does not reset the sequence to zero.
    pub fn new_with_sequence(thresholds: CheckpointThresholds, sequence: u64) -> Self {
        CheckpointManager {
            thresholds,
            ops_since_checkpoint: AtomicU64::new(0),
            last_checkpoint: Mutex::new(Instant::now()),
            sequence: AtomicU64::new(sequence),
        }
    }

    /// Record one WAL-appending operation toward the op-count trigger.
    pub fn record_op(&self) {
        self.ops_since_checkpoint.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether a checkpoint should run now, given the WAL section's
    /// current size.
    pub fn should_checkpoint(&self, wal_size_bytes: u64) -> bool {
        if self.ops_since_checkpoint.load(Ordering::SeqCst) >= self.thresholds.ops {
            return true;
        }
        if wal_size_bytes >= self.thresholds.wal_bytes {
            return true;
        }
        self.last_checkpoint.lock().unwrap().elapsed() >= self.thresholds.interval
    }

    /// Reset counters after a checkpoint has completed and bump the
    /// checkpoint sequence number.
    pub fn mark_checkpointed(&self) -> u64 {
        self.ops_since_checkpoint.store(0, Ordering::SeqCst);
        *self.last_checkpoint.lock().unwrap() = Instant::now();
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_on_op_count_threshold() {
        let manager = CheckpointManager::new(CheckpointThresholds {
            ops: 3,
            ..Default::default()
        });
        assert!(!manager.should_checkpoint(0));
        manager.record_op();
        manager.record_op();
        manager.record_op();
        assert!(manager.should_checkpoint(0));
    }

    #[test]
    fn triggers_on_wal_size_threshold() {
        let manager = CheckpointManager::new(CheckpointThresholds {
            wal_bytes: 100,
            ..Default::default()
        });
        assert!(!manager.should_checkpoint(50));
        assert!(manager.should_checkpoint(100));
    }

    #[test]
    fn mark_checkpointed_resets_op_counter_and_bumps_sequence() {
        let manager = CheckpointManager::new(CheckpointThresholds {
            ops: 1,
            ..Default::default()
        });
        manager.record_op();
        assert!(manager.should_checkpoint(0));
        let seq = manager.mark_checkpointed();
        assert_eq!(seq, 1);
        assert!(!manager.should_checkpoint(0));
        assert_eq!(manager.sequence(), 1);
    }
}
