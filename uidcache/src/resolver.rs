//! Stable-identity resolver
//!
//! Translates a (scope, UID) pair into a live host handle. The expensive part,
//! walking every child of the scope, is memoized in a [`Cache`]; lifecycle
//! hooks clear that cache whenever handles may have gone stale.
//!
//! Handles returned here are only good for the current host operation. After
//! a load or undo/redo the caller resolves again; the resolver itself never
//! checks whether a handle is still alive.

use crate::cache::{Cache, CacheConfig, CacheRegistry};
use crate::error::{Result, UidCacheError};
use crate::uid::{generate_uid, ScopeId, ScopedUid, Uid};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// How many fresh UIDs `assign` tries before giving up on a scope
pub const MAX_GENERATION_ATTEMPTS: usize = 8;

/// A host container whose children carry UIDs (a material's node tree, a
/// node group, the list of layers of a material, ...).
///
/// Implemented by the host binding layer; the resolver only reads through it,
/// apart from [`UidScope::attach_uid`].
pub trait UidScope {
    /// Host-native reference to a child entity
    type Handle: Clone;

    /// Identity of this container, stable across lookups
    fn scope_id(&self) -> ScopeId;

    /// All children, in host order
    fn children(&self) -> impl Iterator<Item = Self::Handle> + '_;

    /// The UID stored on `child`, if any
    fn uid_of(&self, child: &Self::Handle) -> Option<Uid>;

    /// Store `uid` on `child`
    fn attach_uid(&mut self, child: &Self::Handle, uid: &Uid);
}

/// Marker for a full scan that found nothing; never leaves this module.
struct NotFound;

/// Cache-backed UID lookup for one entity kind
pub struct Resolver<H> {
    cache: Arc<Cache<ScopedUid, H>>,
    generate: fn() -> Uid,
}

impl<H> Clone for Resolver<H> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            generate: self.generate,
        }
    }
}

impl<H> Resolver<H>
where
    H: Clone + 'static,
{
    /// Resolve through an existing cache
    pub fn new(cache: Arc<Cache<ScopedUid, H>>) -> Self {
        Self {
            cache,
            generate: generate_uid,
        }
    }

    /// Create the backing cache in `registry` so lifecycle hooks clear it
    pub fn register(registry: &CacheRegistry, name: &str, config: CacheConfig) -> Result<Self>
    where
        H: Send + Sync,
    {
        Ok(Self::new(registry.register(name, config)?))
    }

    /// Use a different UID source for `assign`
    pub fn with_uid_source(mut self, generate: fn() -> Uid) -> Self {
        self.generate = generate;
        self
    }

    pub fn cache(&self) -> &Arc<Cache<ScopedUid, H>> {
        &self.cache
    }

    /// Find the child of `scope` carrying `uid`.
    ///
    /// A cache miss scans every child, because the entity may have been
    /// created since the last lookup. `None` is a normal outcome (deleted
    /// entity, stale UID) and is not cached.
    pub fn resolve<S>(&self, scope: &S, uid: &Uid) -> Option<H>
    where
        S: UidScope<Handle = H>,
    {
        let key = ScopedUid::new(scope.scope_id(), uid.clone());
        self.cache
            .try_get_or_insert_with(key, || Self::scan(scope, uid).ok_or(NotFound))
            .ok()
    }

    /// Attach a UID to `entity` and pre-populate the cache so the next
    /// `resolve` for it is a hit.
    ///
    /// With `uid == None`, an entity that already has a UID keeps it (UIDs are
    /// immutable once assigned); otherwise a fresh UID is generated and checked
    /// against the rest of the scope. An explicit UID is attached as given.
    pub fn assign<S>(&self, scope: &mut S, entity: &H, uid: Option<Uid>) -> Result<Uid>
    where
        S: UidScope<Handle = H>,
    {
        let scope_id = scope.scope_id();
        let previous = scope.uid_of(entity);

        let uid = match (uid, previous.clone()) {
            (Some(uid), _) => uid,
            (None, Some(existing)) => existing,
            (None, None) => self.fresh_uid(scope, &scope_id)?,
        };

        if let Some(previous) = previous.filter(|previous| previous != &uid) {
            debug!("Replacing UID {} with {} in scope {}", previous, uid, scope_id);
            self.cache.invalidate(&ScopedUid::new(scope_id.clone(), previous));
        }

        scope.attach_uid(entity, &uid);
        self.cache
            .insert(ScopedUid::new(scope_id, uid.clone()), entity.clone());
        Ok(uid)
    }

    /// Drop the cached resolution for `uid`, e.g. after the entity was deleted
    pub fn forget<S>(&self, scope: &S, uid: &Uid) -> bool
    where
        S: UidScope<Handle = H>,
    {
        self.cache
            .invalidate(&ScopedUid::new(scope.scope_id(), uid.clone()))
    }

    fn scan<S>(scope: &S, uid: &Uid) -> Option<H>
    where
        S: UidScope<Handle = H>,
    {
        scope
            .children()
            .find(|child| scope.uid_of(child).as_ref() == Some(uid))
    }

    fn fresh_uid<S>(&self, scope: &S, scope_id: &ScopeId) -> Result<Uid>
    where
        S: UidScope<Handle = H>,
    {
        let taken: HashSet<Uid> = scope
            .children()
            .filter_map(|child| scope.uid_of(&child))
            .collect();

        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let candidate = (self.generate)();
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            warn!("Generated UID {} already exists in scope {}; retrying", candidate, scope_id);
        }

        Err(UidCacheError::UidSpaceExhausted {
            scope: scope_id.to_string(),
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }
}
