//! Optional coalescing of tag-appends into grouped flushes (spec §6,
//! `use_batch_writes`).
//!
//! `create`/`update`/`delete` always commit durably on the calling
//! thread — `update`/`delete` are full-file rewrites (too heavy to
//! coalesce; see `DESIGN.md`'s open-question resolution) and `create`
//! must reject a duplicate id synchronously. Only the WAL-only fast path
//! (`add_tag`/`remove_tag`) is actually deferrable, so that is the only
//! thing this batch accumulates.
//!
//! There is no background thread here: the repository calls
//! [`BatchWriter::push`] on every mutating call, and checks
//! [`BatchWriter::should_flush`] itself (size or time threshold reached)
//! to decide whether to drain and apply the batch now. This keeps the
//! engine's concurrency story exactly the one described in spec §5 — no
//! extra threads, no extra lock ordering to reason about.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum BatchOp {
    AddTag { id: String, tag: String },
    RemoveTag { id: String, tag: String },
}

pub struct BatchWriter {
    batch_size: usize,
    flush_interval: Duration,
    pending: Mutex<Vec<BatchOp>>,
    last_flush: Mutex<Instant>,
}

impl BatchWriter {
    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        BatchWriter {
            batch_size: batch_size.max(1),
            flush_interval,
            pending: Mutex::new(Vec::new()),
            last_flush: Mutex::new(Instant::now()),
        }
    }

    pub fn push(&self, op: BatchOp) {
        self.pending.lock().push(op);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn should_flush(&self) -> bool {
        let pending_len = self.pending.lock().len();
        if pending_len == 0 {
            return false;
        }
        pending_len >= self.batch_size || self.last_flush.lock().elapsed() >= self.flush_interval
    }

    /// Take every pending op, resetting the flush timer.
    pub fn drain(&self) -> Vec<BatchOp> {
        let mut pending = self.pending.lock();
        let ops = std::mem::take(&mut *pending);
        *self.last_flush.lock() = Instant::now();
        ops
    }
}
