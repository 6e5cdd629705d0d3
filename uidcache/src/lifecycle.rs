//! Host lifecycle hooks
//!
//! Caches only stay correct if they are dropped whenever the host replaces or
//! rewinds its document. The host binds its load and undo/redo signals to
//! [`LifecycleHooks`]; every hook is synchronous, so an invalidation always
//! completes before the next resolve observes the caches.

use crate::cache::CacheRegistry;
use crate::reconcile::{NamedEntity, ReconcileReport, Reconciler};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, trace, warn};

/// Host signals the hooks respond to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A document was loaded or replaced
    Load,
    Undo,
    Redo,
    /// Per-change dependency graph notification
    TopologyChanged,
    Save,
    Exit,
}

impl LifecycleEvent {
    /// Every event a host binding should register
    pub const ALL: [LifecycleEvent; 6] = [
        LifecycleEvent::Load,
        LifecycleEvent::Undo,
        LifecycleEvent::Redo,
        LifecycleEvent::TopologyChanged,
        LifecycleEvent::Save,
        LifecycleEvent::Exit,
    ];

    /// Whether handling this event drops cached state
    pub fn invalidates(self) -> bool {
        matches!(
            self,
            LifecycleEvent::Load | LifecycleEvent::Undo | LifecycleEvent::Redo
        )
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleEvent::Load => "load",
            LifecycleEvent::Undo => "undo",
            LifecycleEvent::Redo => "redo",
            LifecycleEvent::TopologyChanged => "topology_changed",
            LifecycleEvent::Save => "save",
            LifecycleEvent::Exit => "exit",
        };
        write!(f, "{}", name)
    }
}

/// How often the invalidating hooks have run
#[derive(Debug, Default)]
pub struct LifecycleCounters {
    loads: AtomicU64,
    undo_redos: AtomicU64,
}

impl LifecycleCounters {
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn undo_redos(&self) -> u64 {
        self.undo_redos.load(Ordering::Relaxed)
    }
}

/// Lifecycle handlers bound to one document session's caches
pub struct LifecycleHooks {
    registry: Arc<CacheRegistry>,
    reconciler: Reconciler,
    counters: LifecycleCounters,
}

impl LifecycleHooks {
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self::with_reconciler(registry, Reconciler::default())
    }

    pub fn with_reconciler(registry: Arc<CacheRegistry>, reconciler: Reconciler) -> Self {
        Self {
            registry,
            reconciler,
            counters: LifecycleCounters::default(),
        }
    }

    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn counters(&self) -> &LifecycleCounters {
        &self.counters
    }

    /// Document loaded: drop every cache, then reconcile duplicate UIDs across
    /// the document's top-level named entities.
    pub fn on_load<E: NamedEntity>(&self, entities: &mut [E]) -> ReconcileReport {
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        let cleared = self.registry.clear_all();
        let report = self.reconciler.reconcile(entities);
        info!(
            "Document loaded: {} cache entries dropped, {} UIDs updated",
            cleared,
            report.changed()
        );
        report
    }

    /// Undo or redo: the document may have rewound, so drop every cache.
    /// Returns the number of entries dropped.
    pub fn on_undo_redo(&self) -> usize {
        self.counters.undo_redos.fetch_add(1, Ordering::Relaxed);
        let cleared = self.registry.clear_all();
        info!("Undo/redo: {} cache entries dropped", cleared);
        cleared
    }

    /// Dependency graph changed. Deliberately does nothing.
    ///
    /// This fires tens of times per second during interactive editing. Running
    /// reconciliation or clearing caches here stalled the host for ~16ms per
    /// call. Keep it registered so bindings stay stable, and keep it empty:
    /// no logging, no counters, no cache access.
    #[inline]
    pub fn on_topology_hint(&self) {}

    /// Route an event that carries no entity set.
    ///
    /// `Load` needs the document's entities to reconcile; dispatching it here
    /// only clears caches. Returns the number of cache entries dropped.
    pub fn dispatch(&self, event: LifecycleEvent) -> usize {
        match event {
            LifecycleEvent::Load => {
                self.counters.loads.fetch_add(1, Ordering::Relaxed);
                warn!("Load dispatched without entities; caches cleared, reconciliation skipped");
                self.registry.clear_all()
            }
            LifecycleEvent::Undo | LifecycleEvent::Redo => self.on_undo_redo(),
            LifecycleEvent::TopologyChanged => {
                self.on_topology_hint();
                0
            }
            LifecycleEvent::Save | LifecycleEvent::Exit => {
                trace!("Lifecycle event {} needs no cache work", event);
                0
            }
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("registry", &self.registry)
            .field("policy", &self.reconciler.policy())
            .field("counters", &self.counters)
            .finish()
    }
}
