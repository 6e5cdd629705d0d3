//! Walks through a document session
//!
//! This example shows how to:
//! - Build caches from `UIDCACHE_*` environment variables (or a `.env` file)
//! - Assign and resolve node UIDs
//! - Clear caches on undo/redo and reconcile duplicates on load
//!
//! Run with `RUST_LOG=uidcache=debug` to see every hit and miss.

use std::sync::Arc;
use tracing::info;
use uidcache::telemetry::init_tracing;
use uidcache::{
    CacheConfig, CacheRegistry, LifecycleEvent, LifecycleHooks, NamedEntity, Resolver, ScopeId,
    Uid, UidScope,
};

#[derive(Debug)]
struct Material {
    name: String,
    uid: Option<Uid>,
    nodes: Vec<(String, Option<Uid>)>,
}

impl NamedEntity for Material {
    fn name(&self) -> &str {
        &self.name
    }

    fn uid(&self) -> Option<Uid> {
        self.uid.clone()
    }

    fn set_uid(&mut self, uid: Uid) {
        self.uid = Some(uid);
    }
}

impl UidScope for Material {
    type Handle = usize;

    fn scope_id(&self) -> ScopeId {
        ScopeId::new(self.name.clone())
    }

    fn children(&self) -> impl Iterator<Item = usize> + '_ {
        0..self.nodes.len()
    }

    fn uid_of(&self, child: &usize) -> Option<Uid> {
        self.nodes.get(*child).and_then(|(_, uid)| uid.clone())
    }

    fn attach_uid(&mut self, child: &usize, uid: &Uid) {
        if let Some((_, slot)) = self.nodes.get_mut(*child) {
            *slot = Some(uid.clone());
        }
    }
}

fn material(name: &str, nodes: &[&str]) -> Material {
    Material {
        name: name.to_string(),
        uid: None,
        nodes: nodes.iter().map(|label| (label.to_string(), None)).collect(),
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = CacheConfig::from_env("UIDCACHE")?;
    info!("Using cache config: {}", serde_json::to_string(&config)?);

    let registry = Arc::new(CacheRegistry::with_default_config(config.clone()));
    let hooks = LifecycleHooks::new(registry.clone());
    let nodes: Resolver<usize> = Resolver::register(&registry, "nodes", config)?;

    // 1. Load a document in which "Wood" was duplicated without its UID
    let mut document = vec![
        material("Wood", &["Principled BSDF", "Image Texture"]),
        material("Wood.001", &["Principled BSDF"]),
        material("Metal", &["Principled BSDF"]),
    ];
    let report = hooks.on_load(&mut document);
    println!("1. Load: {}", serde_json::to_string(&report)?);

    // 2. Give a node a UID and resolve it twice
    let wood = &mut document[0];
    let texture = nodes.assign(wood, &1, None)?;
    for _ in 0..2 {
        let handle = nodes.resolve(&*wood, &texture);
        println!("2. Resolve {} -> {:?}", texture, handle.map(|i| &wood.nodes[i].0));
    }

    // 3. Edits fire dependency graph updates; the cache survives them
    for _ in 0..10 {
        hooks.dispatch(LifecycleEvent::TopologyChanged);
    }
    println!("3. After topology hints: {} cached", nodes.cache().len());

    // 4. Undo drops everything; the next resolve scans again
    let dropped = hooks.dispatch(LifecycleEvent::Undo);
    println!("4. Undo dropped {} entries", dropped);
    nodes.resolve(&document[0], &texture);

    println!("\n{}", registry.report());
    Ok(())
}
