//! Module graph walker
//!
//! Enumerates every module reachable from a root by following slot values,
//! keeping only modules whose backing file lies under the root's directory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use crate::error::{BindError, BindResult};
use crate::module::{Module, ModuleHandle, Value};

/// Modules found by [`walk`], keyed by canonical path, in visitation order
#[derive(Debug, Clone, Default)]
pub struct ModuleMap {
    entries: Vec<(PathBuf, ModuleHandle)>,
    index: AHashMap<PathBuf, usize>,
}

impl ModuleMap {
    /// Look up a module by canonical path
    pub fn get(&self, path: &Path) -> Option<&ModuleHandle> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    /// Whether a path was recorded
    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    /// Iterate in depth-first visitation order
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &ModuleHandle)> {
        self.entries.iter().map(|(p, m)| (p.as_path(), m))
    }

    /// Canonical paths in visitation order
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|(p, _)| p.as_path())
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no module was found
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, path: PathBuf, module: ModuleHandle) {
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, module));
    }
}

/// Walk the module graph under `root`.
///
/// Traversal is depth-first over attribute names in sorted order. A module
/// whose path was already recorded is not entered again. Modules without a
/// backing file are not recorded but their slots are still followed. Slots
/// whose read fails are skipped.
pub fn walk(root: &ModuleHandle) -> BindResult<ModuleMap> {
    let root_path = root
        .file()
        .map(canonical_path)
        .ok_or_else(|| BindError::NoBackingFile(root.name().to_string()))?;
    let root_dir = root_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut walker = Walker {
        root_dir,
        map: ModuleMap::default(),
        synthetic_seen: AHashSet::new(),
    };
    walker.visit(root);

    log::debug!(
        "walked `{}`: {} module(s) under {}",
        root.name(),
        walker.map.len(),
        walker.root_dir.display()
    );
    Ok(walker.map)
}

struct Walker {
    root_dir: PathBuf,
    map: ModuleMap,
    synthetic_seen: AHashSet<*const Module>,
}

impl Walker {
    fn visit(&mut self, module: &ModuleHandle) {
        match module.file() {
            Some(file) => {
                let path = canonical_path(file);
                if self.map.contains(&path) || !path.starts_with(&self.root_dir) {
                    return;
                }
                self.map.insert(path, module.clone());
            }
            None => {
                if !self.synthetic_seen.insert(Arc::as_ptr(module)) {
                    return;
                }
            }
        }

        for name in module.attr_names() {
            match module.get_attr(&name) {
                Ok(Value::Module(child)) => self.visit(&child),
                Ok(Value::Object(_)) => {}
                Err(e) => log::trace!("skipping `{}.{}`: {}", module.name(), name, e),
            }
        }
    }
}

/// Resolve a module file to the path used for identity and scoping.
///
/// Existing files are canonicalized through the filesystem; anything else is
/// normalized lexically so virtual module trees behave the same way.
pub fn canonical_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| normalize_lexically(path))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use pretty_assertions::assert_eq;

    fn names(map: &ModuleMap) -> Vec<String> {
        map.iter().map(|(_, m)| m.name().to_string()).collect()
    }

    #[test]
    fn test_root_without_file_is_rejected() {
        let root = Module::synthetic("root");
        assert!(matches!(walk(&root), Err(BindError::NoBackingFile(_))));
    }

    #[test]
    fn test_depth_first_order_and_cycles() {
        let root = Module::new("root", "/pkg/lib.rs");
        let a = Module::new("a", "/pkg/a.rs");
        let b = Module::new("b", "/pkg/sub/b.rs");
        let c = Module::new("c", "/pkg/c.rs");

        root.set_attr("a", a.clone()).unwrap();
        root.set_attr("c", c.clone()).unwrap();
        a.set_attr("b", b.clone()).unwrap();
        b.set_attr("back", root.clone()).unwrap();
        c.set_attr("a_again", a.clone()).unwrap();

        let map = walk(&root).unwrap();
        assert_eq!(names(&map), vec!["root", "a", "b", "c"]);
    }

    #[test]
    fn test_modules_outside_root_dir_are_excluded() {
        let root = Module::new("root", "/pkg/lib.rs");
        let outside = Module::new("outside", "/other/lib.rs");
        let hidden = Module::new("hidden", "/pkg/hidden.rs");
        root.set_attr("outside", outside.clone()).unwrap();
        outside.set_attr("hidden", hidden).unwrap();

        let map = walk(&root).unwrap();
        assert_eq!(names(&map), vec!["root"]);
    }

    #[test]
    fn test_synthetic_modules_are_traversed_not_recorded() {
        let root = Module::new("root", "/pkg/lib.rs");
        let shim = Module::synthetic("shim");
        let inner = Module::new("inner", "/pkg/inner.rs");
        root.set_attr("shim", shim.clone()).unwrap();
        shim.set_attr("inner", inner).unwrap();
        shim.set_attr("me", shim.clone()).unwrap();

        let map = walk(&root).unwrap();
        assert_eq!(names(&map), vec!["root", "inner"]);
    }

    #[test]
    fn test_failing_attributes_do_not_abort_walk() {
        let root = Module::new("root", "/pkg/lib.rs");
        let later = Module::new("later", "/pkg/later.rs");
        root.define_getter("a_broken", || Err("attribute raised".into()))
            .unwrap();
        root.set_attr("b_later", later).unwrap();
        root.set_attr("c_value", Object::new(1_u8)).unwrap();

        let map = walk(&root).unwrap();
        assert_eq!(names(&map), vec!["root", "later"]);
    }

    #[test]
    fn test_lexical_normalization() {
        assert_eq!(
            normalize_lexically(Path::new("/pkg/src/../../core/./lib.rs")),
            PathBuf::from("/core/lib.rs")
        );
        let root = Module::new("root", "/pkg/src/lib.rs");
        let sibling = Module::new("sib", "/pkg/src/../other.rs");
        root.set_attr("sib", sibling).unwrap();
        assert_eq!(names(&walk(&root).unwrap()), vec!["root"]);
    }

    #[test]
    fn test_real_files_are_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let lib = dir.path().join("lib.rs");
        let child = dir.path().join("sub").join("child.rs");
        std::fs::write(&lib, "").unwrap();
        std::fs::write(&child, "").unwrap();

        let root = Module::new("root", &lib);
        let via_dots = Module::new("child", dir.path().join("sub/../sub/child.rs"));
        root.set_attr("child", via_dots).unwrap();

        let map = walk(&root).unwrap();
        assert_eq!(map.len(), 2);
        let canonical_child = std::fs::canonicalize(&child).unwrap();
        assert_eq!(map.get(&canonical_child).unwrap().name(), "child");
    }
}
