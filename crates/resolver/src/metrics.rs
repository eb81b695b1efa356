//! Metrics hooks for the resolver.
//!
//! Installing a [`ResolveMetrics`] implementation via
//! [`set_resolve_metrics`] makes every [`Resolver`](crate::Resolver)
//! report per-call latency and hit counts plus cleanup outcomes, without
//! tying this crate to any particular metrics backend.

use once_cell::sync::OnceCell;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Observer for resolution calls.
pub trait ResolveMetrics: Send + Sync {
    /// One successful resolution call: the canonical type of the first
    /// input (when it carries one), wall-clock latency, how many
    /// documents were resolved, and how many hits came back in total.
    fn record_resolve(
        &self,
        entity_type: Option<&str>,
        latency: Duration,
        documents: usize,
        hits: usize,
    );

    /// One cleanup pass: whether it was a full sweep and how many staged
    /// documents it deleted.
    fn record_cleanup(&self, swept: bool, deleted: u64);
}

static METRICS: OnceCell<RwLock<Option<Arc<dyn ResolveMetrics>>>> = OnceCell::new();

fn metrics_slot() -> &'static RwLock<Option<Arc<dyn ResolveMetrics>>> {
    METRICS.get_or_init(|| RwLock::new(None))
}

/// Installs the process-wide metrics recorder.
pub fn set_resolve_metrics(recorder: Arc<dyn ResolveMetrics>) {
    let mut slot = metrics_slot()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = Some(recorder);
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn ResolveMetrics>> {
    metrics_slot()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}
