//! The per-cell write hook and the module graph that holds it
//!
//! The crate publishes its own modules as a [`Module`] graph. The crate root,
//! `writer` and `writer::cell` each expose a `write_cell` slot bound to the
//! same hook object; the worksheet serializer reads the one in `writer`.
//! Rebinding all three (by locating them, or through the registry point
//! [`WRITE_CELL_POINT`]) changes how every cell is emitted.
//!
//! Reads and rebinds of those slots are ordered by one process-wide lock:
//! writers that resolve the hook from the slot hold [`lock_shared`], and
//! anything rebinding the slots holds the [`HookOverrideGuard`] from
//! [`lock_for_override`].

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cellbind_core::{CellAddress, CellValue};
use cellbind_rebind::{Module, ModuleHandle, Object, OverrideRegistry, Value};
use once_cell::sync::Lazy;

use crate::error::{XlsxError, XlsxResult};
use crate::sink::CellSink;

/// Registry point under which the `write_cell` slots are registered
pub const WRITE_CELL_POINT: &str = "xlsx.write_cell";

/// Name of the hook slot in each module
pub const WRITE_CELL_SLOT: &str = "write_cell";

type CellWriteFn = dyn Fn(&mut dyn CellSink, &CellContext<'_>) -> XlsxResult<()> + Send + Sync;

/// The cell being written
#[derive(Debug, Clone, Copy)]
pub struct CellContext<'a> {
    pub sheet: &'a str,
    pub address: CellAddress,
    pub value: &'a CellValue,
}

/// A routine that writes one cell to a sink
#[derive(Clone)]
pub struct WriteCellHook(Arc<CellWriteFn>);

impl WriteCellHook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut dyn CellSink, &CellContext<'_>) -> XlsxResult<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, sink: &mut dyn CellSink, cell: &CellContext<'_>) -> XlsxResult<()> {
        (self.0)(sink, cell)
    }

    /// Wrap as a slot value
    pub fn into_object(self) -> Object {
        Object::new(self)
    }

    /// The hook stored in a slot value, if it is one
    pub fn from_object(object: &Object) -> Option<Self> {
        object.downcast_ref::<WriteCellHook>().cloned()
    }
}

impl fmt::Debug for WriteCellHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WriteCellHook@{:p}", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Modules of this crate that carry a `write_cell` slot
pub struct HookPackage {
    root: ModuleHandle,
    writer: ModuleHandle,
    cell: ModuleHandle,
    original: Object,
}

impl HookPackage {
    fn build() -> XlsxResult<Self> {
        let original = WriteCellHook::new(crate::writer::cell::write_cell).into_object();

        let root = Module::new("cellbind_xlsx", source_path("src/lib.rs"));
        let writer = Module::new("cellbind_xlsx::writer", source_path("src/writer/mod.rs"));
        let cell = Module::new("cellbind_xlsx::writer::cell", source_path("src/writer/cell.rs"));
        let core = Module::new("cellbind_core", source_path("../cellbind-core/src/lib.rs"));

        core.set_attr("MAX_ROWS", Object::new(cellbind_core::MAX_ROWS))?;
        core.set_attr("MAX_COLS", Object::new(cellbind_core::MAX_COLS))?;

        root.set_attr("core", core)?;
        root.set_attr("writer", writer.clone())?;
        root.set_attr(WRITE_CELL_SLOT, original.clone())?;
        writer.set_attr("cell", cell.clone())?;
        writer.set_attr(WRITE_CELL_SLOT, original.clone())?;
        cell.set_attr(WRITE_CELL_SLOT, original.clone())?;

        Ok(Self {
            root,
            writer,
            cell,
            original,
        })
    }

    /// Crate root module; the walk root for locating the hook
    pub fn root(&self) -> &ModuleHandle {
        &self.root
    }

    /// Module whose `write_cell` slot the serializer reads
    pub fn writer(&self) -> &ModuleHandle {
        &self.writer
    }

    pub fn cell(&self) -> &ModuleHandle {
        &self.cell
    }

    /// The default hook object every slot starts out bound to
    pub fn original(&self) -> &Object {
        &self.original
    }

    /// Register every `write_cell` slot under [`WRITE_CELL_POINT`]
    pub fn register(&self, registry: &mut OverrideRegistry) {
        for module in [&self.root, &self.writer, &self.cell] {
            registry.register_attribute(WRITE_CELL_POINT, module, WRITE_CELL_SLOT);
        }
    }
}

static PACKAGE: Lazy<HookPackage> = Lazy::new(|| match HookPackage::build() {
    Ok(package) => package,
    // Fresh modules are unsealed and have no getters, so building cannot fail.
    Err(e) => unreachable!("building the hook package failed: {e}"),
});

static HOOK_LOCK: Lazy<RwLock<()>> = Lazy::new(|| RwLock::new(()));

/// Exclusive hold on the `write_cell` slots.
///
/// While it lives, no writer resolves its hook from the slots, so a rebinding
/// made under it is seen only by writes made through
/// [`XlsxWriter::write_with_override`](crate::XlsxWriter::write_with_override).
pub struct HookOverrideGuard {
    _guard: RwLockWriteGuard<'static, ()>,
}

impl fmt::Debug for HookOverrideGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HookOverrideGuard")
    }
}

/// Shared hold on the `write_cell` slots, taken while a writer uses the
/// bound hook
pub fn lock_shared() -> RwLockReadGuard<'static, ()> {
    HOOK_LOCK.read().unwrap_or_else(PoisonError::into_inner)
}

/// Wait for every writer reading the slots to finish and keep new ones out
pub fn lock_for_override() -> HookOverrideGuard {
    HookOverrideGuard {
        _guard: HOOK_LOCK.write().unwrap_or_else(PoisonError::into_inner),
    }
}

/// The crate's hook package
pub fn package() -> &'static HookPackage {
    &PACKAGE
}

/// The default `write_cell` hook object
pub fn original_write_cell() -> &'static Object {
    PACKAGE.original()
}

/// The hook currently bound in the `writer` module
pub fn current_write_cell() -> XlsxResult<WriteCellHook> {
    let writer = PACKAGE.writer();
    match writer.get_attr(WRITE_CELL_SLOT)? {
        Value::Object(object) => WriteCellHook::from_object(&object).ok_or_else(|| {
            XlsxError::Lookup(format!(
                "`{}.{}` holds {}, not a write-cell hook",
                writer.name(),
                WRITE_CELL_SLOT,
                object.type_name()
            ))
        }),
        Value::Module(_) => Err(XlsxError::Lookup(format!(
            "`{}.{}` holds a module",
            writer.name(),
            WRITE_CELL_SLOT
        ))),
    }
}

fn source_path(relative: &str) -> String {
    format!("{}/{}", env!("CARGO_MANIFEST_DIR"), relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellbind_rebind::locate_from;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_override_lock_excludes_plain_writers() {
        let guard = lock_for_override();
        assert!(HOOK_LOCK.try_read().is_err());
        drop(guard);

        let _shared = lock_shared();
        assert!(HOOK_LOCK.try_write().is_err());
    }

    #[test]
    fn test_slots_start_at_original() {
        let pkg = package();
        for module in [pkg.root(), pkg.writer(), pkg.cell()] {
            assert!(module
                .get_attr(WRITE_CELL_SLOT)
                .unwrap()
                .is_object(original_write_cell()));
        }
        assert!(current_write_cell().is_ok());
    }

    #[test]
    fn test_locating_the_hook_skips_core() {
        let bindings = locate_from(package().root(), original_write_cell()).unwrap();
        assert_eq!(
            bindings.names(),
            vec![
                "cellbind_xlsx.write_cell",
                "cellbind_xlsx::writer.write_cell",
                "cellbind_xlsx::writer::cell.write_cell",
            ]
        );
    }

    #[test]
    fn test_registry_point_matches_located_slots() {
        let mut registry = OverrideRegistry::new();
        package().register(&mut registry);
        let registered = registry.bindings(WRITE_CELL_POINT).unwrap();
        let located = locate_from(package().root(), original_write_cell()).unwrap();
        assert_eq!(registered, located);
    }

    #[test]
    fn test_hook_object_round_trip() {
        let hook = WriteCellHook::new(|_, _| Ok(()));
        let object = hook.into_object();
        assert!(WriteCellHook::from_object(&object).is_some());
        assert!(WriteCellHook::from_object(&Object::new(1)).is_none());
    }
}
