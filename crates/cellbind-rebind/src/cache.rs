//! Caller-owned memo of located bindings
//!
//! Entries are never invalidated automatically. If a slot found earlier has
//! since been rebound elsewhere, a cached set still points at it; call
//! [`BindingCache::invalidate`] when that can happen.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use ahash::AHashMap;

use crate::binding::BindingSet;
use crate::error::{BindError, BindResult};
use crate::locator::locate;
use crate::module::ModuleHandle;
use crate::object::{Object, ObjectId};
use crate::walker::{canonical_path, walk};

type CacheKey = (PathBuf, ObjectId);

struct Entry {
    // Keeps the target alive so its id cannot be reused while cached.
    _target: Object,
    bindings: BindingSet,
}

/// Cache of binding sets keyed by (root module path, target identity)
#[derive(Default)]
pub struct BindingCache {
    entries: Mutex<AHashMap<CacheKey, Entry>>,
}

impl BindingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached bindings of `target` under `root`, walking on a miss.
    ///
    /// The lock is held across the walk so concurrent misses walk once.
    pub fn lookup_or_compute(&self, root: &ModuleHandle, target: &Object) -> BindResult<BindingSet> {
        let key = (root_path(root)?, target.id());
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get(&key) {
            log::debug!("binding cache hit for {:?} under {}", target, key.0.display());
            return Ok(entry.bindings.clone());
        }

        log::debug!("binding cache miss for {:?} under {}", target, key.0.display());
        let bindings = locate(&walk(root)?, target);
        entries.insert(
            key,
            Entry {
                _target: target.clone(),
                bindings: bindings.clone(),
            },
        );
        Ok(bindings)
    }

    /// Drop the entry for `target` under `root`
    pub fn invalidate(&self, root: &ModuleHandle, target: &Object) -> bool {
        let Ok(path) = root_path(root) else {
            return false;
        };
        self.lock().remove(&(path, target.id())).is_some()
    }

    /// Drop every entry under `root`, returning how many were removed
    pub fn invalidate_root(&self, root: &ModuleHandle) -> usize {
        let Ok(path) = root_path(root) else {
            return 0;
        };
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(p, _), _| *p != path);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AHashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BindingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingCache")
            .field("entries", &self.len())
            .finish()
    }
}

fn root_path(root: &ModuleHandle) -> BindResult<PathBuf> {
    root.file()
        .map(canonical_path)
        .ok_or_else(|| BindError::NoBackingFile(root.name().to_string()))
}
