//! Per-operation tracking: every write/read is wrapped in an `Operation`
//! with a UUID, target id, metadata, and success/failure, surfaced to an
//! observability sink on a best-effort basis (spec §4.10/§6).

use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Get,
    Update,
    Delete,
    AddTag,
    RemoveTag,
    ListByTag,
    Checkpoint,
    Recovery,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Get => "get",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::AddTag => "add_tag",
            OperationKind::RemoveTag => "remove_tag",
            OperationKind::ListByTag => "list_by_tag",
            OperationKind::Checkpoint => "checkpoint",
            OperationKind::Recovery => "recovery",
        }
    }
}

/// External collaborator: best-effort operation tracking. The core
/// tolerates a missing sink entirely via [`NoopOperationSink`].
pub trait OperationSink: Send + Sync {
    fn start(&self, kind: OperationKind, target: &str, metadata: &HashMap<String, String>) -> Uuid;
    fn complete(&self, id: Uuid);
    fn fail(&self, id: Uuid, error: &str);
}

pub struct NoopOperationSink;

impl OperationSink for NoopOperationSink {
    fn start(&self, _kind: OperationKind, _target: &str, _metadata: &HashMap<String, String>) -> Uuid {
        Uuid::nil()
    }
    fn complete(&self, _id: Uuid) {}
    fn fail(&self, _id: Uuid, _error: &str) {}
}

/// RAII guard around one tracked operation: reports completion on drop,
/// defaulting to success unless [`OperationGuard::fail`] was called.
pub struct OperationGuard<'a> {
    sink: &'a dyn OperationSink,
    id: Uuid,
    outcome: Option<String>,
}

impl<'a> OperationGuard<'a> {
    pub fn start(sink: &'a dyn OperationSink, kind: OperationKind, target: &str) -> Self {
        let id = sink.start(kind, target, &HashMap::new());
        OperationGuard { sink, id, outcome: None }
    }

    pub fn start_with_metadata(
        sink: &'a dyn OperationSink,
        kind: OperationKind,
        target: &str,
        metadata: HashMap<String, String>,
    ) -> Self {
        let id = sink.start(kind, target, &metadata);
        OperationGuard { sink, id, outcome: None }
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.outcome = Some(error.into());
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        match self.outcome.take() {
            None => self.sink.complete(self.id),
            Some(err) => self.sink.fail(self.id, &err),
        }
    }
}
