//! Modules: named slot tables with an optional backing file

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{BindError, BindResult};
use crate::object::Object;

/// Shared handle to a module
///
/// Module graphs may contain cycles and are expected to live for the whole
/// process, like the code they describe.
pub type ModuleHandle = Arc<Module>;

type Getter = Arc<dyn Fn() -> Result<Value, String> + Send + Sync>;

/// What a slot holds
#[derive(Clone, Debug)]
pub enum Value {
    /// A plain object
    Object(Object),
    /// A link to another module (an import)
    Module(ModuleHandle),
}

impl Value {
    /// Whether this value is exactly `object` (identity)
    pub fn is_object(&self, object: &Object) -> bool {
        matches!(self, Value::Object(o) if o.same(object))
    }

    /// The object, if this value is one
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            Value::Module(_) => None,
        }
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<ModuleHandle> for Value {
    fn from(module: ModuleHandle) -> Self {
        Value::Module(module)
    }
}

enum Attr {
    Stored(Value),
    Computed(Getter),
}

/// A named table of slots
pub struct Module {
    name: String,
    file: Option<PathBuf>,
    attrs: RwLock<BTreeMap<String, Attr>>,
    sealed: AtomicBool,
}

impl Module {
    /// Create a module backed by `file`
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, file: P) -> ModuleHandle {
        Arc::new(Self {
            name: name.into(),
            file: Some(file.into()),
            attrs: RwLock::new(BTreeMap::new()),
            sealed: AtomicBool::new(false),
        })
    }

    /// Create a module with no backing file
    pub fn synthetic<S: Into<String>>(name: S) -> ModuleHandle {
        Arc::new(Self {
            name: name.into(),
            file: None,
            attrs: RwLock::new(BTreeMap::new()),
            sealed: AtomicBool::new(false),
        })
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file, if any
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Names of all attributes, sorted
    pub fn attr_names(&self) -> Vec<String> {
        self.attrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Whether an attribute with this name exists
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Read an attribute
    pub fn get_attr(&self, name: &str) -> BindResult<Value> {
        let getter = {
            let attrs = self.attrs.read().unwrap_or_else(PoisonError::into_inner);
            match attrs.get(name) {
                Some(Attr::Stored(value)) => return Ok(value.clone()),
                Some(Attr::Computed(getter)) => getter.clone(),
                None => return Err(self.not_found(name)),
            }
        };

        // The getter runs without the lock held; it may read this module.
        getter().map_err(|message| BindError::AttributeRaised {
            module: self.name.clone(),
            name: name.to_string(),
            message,
        })
    }

    /// Assign an attribute, creating it if needed
    pub fn set_attr<V: Into<Value>>(&self, name: &str, value: V) -> BindResult<()> {
        if self.is_sealed() {
            return Err(BindError::Sealed(self.name.clone()));
        }

        let mut attrs = self.attrs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(Attr::Computed(_)) = attrs.get(name) {
            return Err(BindError::ReadOnly {
                module: self.name.clone(),
                name: name.to_string(),
            });
        }
        attrs.insert(name.to_string(), Attr::Stored(value.into()));
        Ok(())
    }

    /// Define a computed, read-only attribute
    pub fn define_getter<F>(&self, name: &str, getter: F) -> BindResult<()>
    where
        F: Fn() -> Result<Value, String> + Send + Sync + 'static,
    {
        if self.is_sealed() {
            return Err(BindError::Sealed(self.name.clone()));
        }
        self.attrs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Attr::Computed(Arc::new(getter)));
        Ok(())
    }

    /// Remove an attribute, returning whether it existed
    pub fn remove_attr(&self, name: &str) -> BindResult<bool> {
        if self.is_sealed() {
            return Err(BindError::Sealed(self.name.clone()));
        }
        Ok(self
            .attrs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some())
    }

    /// Reject all further writes
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    /// Accept writes again
    pub fn unseal(&self) {
        self.sealed.store(false, Ordering::SeqCst);
    }

    /// Whether writes are rejected
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    fn not_found(&self, name: &str) -> BindError {
        BindError::AttributeNotFound {
            module: self.name.clone(),
            name: name.to_string(),
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}
