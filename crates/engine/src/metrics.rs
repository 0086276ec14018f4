//! Async metric-sink hook and the thread-local recursion guard that
//! prevents persisting a metric entity from cascading into emitting more
//! metric entities.
//!
//! The sink is an external collaborator (spec §6): the core calls
//! `collect` without blocking and tolerates its absence entirely via
//! [`NoopMetricSink`]. The *policy* of what to do with collected metrics
//! (aggregation, export, retention) is out of scope here.

use entity_core::entity::Entity;
use std::cell::Cell;
use std::collections::HashMap;

pub type Labels = HashMap<String, String>;

pub trait MetricSink: Send + Sync {
    fn collect(&self, name: &str, value: f64, unit: &str, description: &str, labels: &Labels);
}

/// Default sink used when the embedder supplies none.
pub struct NoopMetricSink;

impl MetricSink for NoopMetricSink {
    fn collect(&self, _name: &str, _value: f64, _unit: &str, _description: &str, _labels: &Labels) {}
}

thread_local! {
    static EMITTING_METRICS: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is inside a metrics-emitting call.
pub fn is_emitting_metrics() -> bool {
    EMITTING_METRICS.with(|flag| flag.get())
}

/// Run `f` with the recursion guard held, so any metric emission
/// triggered transitively by `f` (e.g. persisting the metric entity
/// itself) is suppressed.
pub fn with_metrics_guard<T>(f: impl FnOnce() -> T) -> T {
    EMITTING_METRICS.with(|flag| flag.set(true));
    let result = f();
    EMITTING_METRICS.with(|flag| flag.set(false));
    result
}

/// Whether a metric about `entity` should be emitted at all: suppressed
/// both while the guard is held and when the entity under discussion is
/// itself a metric (`type:metric`), breaking the repository-stores-its-
/// own-metrics cycle described in spec §9.
pub fn should_emit_for(entity: &Entity) -> bool {
    !is_emitting_metrics() && !entity.is_metric()
}

/// Emit a metric through `sink`, holding the recursion guard for the
/// duration of the call.
pub fn emit(sink: &dyn MetricSink, name: &str, value: f64, unit: &str, description: &str, labels: &Labels) {
    if is_emitting_metrics() {
        return;
    }
    with_metrics_guard(|| sink.collect(name, value, unit, description, labels));
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_core::entity_id::EntityId;
    use entity_core::tag::Tag;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink(Arc<AtomicUsize>);

    impl MetricSink for CountingSink {
        fn collect(&self, _name: &str, _value: f64, _unit: &str, _description: &str, _labels: &Labels) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emit_runs_normally_outside_guard() {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink(count.clone());
        emit(&sink, "op.count", 1.0, "count", "test", &Labels::new());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_emit_inside_guard_is_suppressed() {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink(count.clone());
        with_metrics_guard(|| {
            emit(&sink, "op.count", 1.0, "count", "test", &Labels::new());
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn metric_entities_are_excluded_from_emission() {
        let metric_entity = Entity::new(
            EntityId::generate(),
            vec![Tag::wrap("type:metric", 1)],
            None,
        );
        assert!(!should_emit_for(&metric_entity));

        let normal_entity = Entity::new(EntityId::generate(), vec![Tag::wrap("type:user", 1)], None);
        assert!(should_emit_for(&normal_entity));
    }

    #[test]
    fn guard_resets_after_use_on_same_thread() {
        assert!(!is_emitting_metrics());
        with_metrics_guard(|| assert!(is_emitting_metrics()));
        assert!(!is_emitting_metrics());
    }
}
