//! # uidcache
//!
//! Stable identities for entities that live inside a host document.
//!
//! Host entities (materials, nodes, layers) are renamed and duplicated freely,
//! so names make poor references. This crate gives each entity a short random
//! UID, resolves UIDs back to live host handles through an invalidating cache,
//! and repairs UIDs after the host duplicates entities.
//!
//! ## Features
//!
//! - 10-character lowercase hex UIDs ([`generate_uid`], [`is_valid_format`])
//! - Generic TTL + LRU cache with hit/miss statistics ([`cache`])
//! - Named caches shared through an explicit [`CacheRegistry`]
//! - Scope-aware UID resolution with collision-checked assignment ([`Resolver`])
//! - Lifecycle hooks that clear caches on load and undo/redo ([`LifecycleHooks`])
//! - Duplicate-identity reconciliation after the host copies entities
//!   ([`reconcile_duplicates`])
//!
//! ## Resolving UIDs
//!
//! ```rust
//! use uidcache::{CacheConfig, CacheRegistry, Resolver, ScopeId, Uid, UidScope};
//!
//! struct NodeTree {
//!     name: String,
//!     uids: Vec<Option<Uid>>,
//! }
//!
//! impl UidScope for NodeTree {
//!     type Handle = usize;
//!
//!     fn scope_id(&self) -> ScopeId {
//!         ScopeId::new(self.name.clone())
//!     }
//!
//!     fn children(&self) -> impl Iterator<Item = usize> + '_ {
//!         0..self.uids.len()
//!     }
//!
//!     fn uid_of(&self, child: &usize) -> Option<Uid> {
//!         self.uids.get(*child).cloned().flatten()
//!     }
//!
//!     fn attach_uid(&mut self, child: &usize, uid: &Uid) {
//!         self.uids[*child] = Some(uid.clone());
//!     }
//! }
//!
//! # fn main() -> uidcache::Result<()> {
//! let registry = CacheRegistry::new();
//! let nodes: Resolver<usize> = Resolver::register(&registry, "nodes", CacheConfig::default())?;
//!
//! let mut tree = NodeTree { name: "Wood".into(), uids: vec![None, None] };
//! let uid = nodes.assign(&mut tree, &1, None)?;
//!
//! assert_eq!(nodes.resolve(&tree, &uid), Some(1));
//! assert_eq!(registry.get_stats("nodes").unwrap().hits, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle
//!
//! ```rust
//! use std::sync::Arc;
//! use uidcache::{CacheRegistry, LifecycleEvent, LifecycleHooks};
//!
//! let registry = Arc::new(CacheRegistry::new());
//! let hooks = LifecycleHooks::new(registry.clone());
//!
//! for event in LifecycleEvent::ALL {
//!     // bind `event` to the host signal here
//!     let _ = event;
//! }
//!
//! hooks.on_undo_redo();
//! hooks.on_topology_hint(); // no-op
//! ```

pub mod cache;
pub mod error;
pub mod lifecycle;
pub mod reconcile;
pub mod resolver;
pub mod telemetry;
pub mod uid;

// Re-export main types for convenience
pub use cache::{Cache, CacheConfig, CacheRegistry, CacheStats, InvalidationReason};
pub use error::{Result, UidCacheError};
pub use lifecycle::{LifecycleCounters, LifecycleEvent, LifecycleHooks};
pub use reconcile::{
    reconcile_duplicates, Classification, DuplicateClassifier, DuplicateGroup, DuplicatePolicy,
    NameSuffixClassifier, NamedEntity, ReconcileReport, Reconciler,
};
pub use resolver::{Resolver, UidScope, MAX_GENERATION_ATTEMPTS};
pub use uid::{generate_uid, is_valid_format, ScopeId, ScopedUid, Uid, UID_LEN};
