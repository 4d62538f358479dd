//! Bindings: references to mutable named slots

use std::fmt;
use std::sync::Arc;

use crate::error::{BindError, BindResult};
use crate::module::{ModuleHandle, Value};
use crate::object::Object;
use crate::registry::SlotAccessor;

/// A reference to one mutable slot. Does not own the value in the slot.
#[derive(Clone)]
pub enum SymbolBinding {
    /// An attribute of a module
    Attribute { module: ModuleHandle, name: String },
    /// A slot reached through a caller-supplied getter/setter pair
    Accessor(Arc<SlotAccessor>),
}

/// Stable identity of a slot, used to detect overlapping sessions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Attribute { module: usize, name: String },
    Accessor(usize),
}

impl SymbolBinding {
    /// Binding for `module.name`
    pub fn attribute<S: Into<String>>(module: &ModuleHandle, name: S) -> Self {
        SymbolBinding::Attribute {
            module: module.clone(),
            name: name.into(),
        }
    }

    /// Current object in the slot
    pub fn get(&self) -> BindResult<Object> {
        match self {
            SymbolBinding::Attribute { module, name } => match module.get_attr(name)? {
                Value::Object(object) => Ok(object),
                Value::Module(_) => Err(BindError::AttributeRaised {
                    module: module.name().to_string(),
                    name: name.clone(),
                    message: "slot holds a module, not an object".into(),
                }),
            },
            SymbolBinding::Accessor(accessor) => accessor.get(),
        }
    }

    /// Store `value` in the slot
    pub fn set(&self, value: Object) -> BindResult<()> {
        match self {
            SymbolBinding::Attribute { module, name } => module.set_attr(name, value),
            SymbolBinding::Accessor(accessor) => accessor.set(value),
        }
    }

    /// Identity of the slot
    pub fn key(&self) -> SlotKey {
        match self {
            SymbolBinding::Attribute { module, name } => SlotKey::Attribute {
                module: Arc::as_ptr(module) as usize,
                name: name.clone(),
            },
            SymbolBinding::Accessor(accessor) => {
                SlotKey::Accessor(Arc::as_ptr(accessor) as usize)
            }
        }
    }
}

impl PartialEq for SymbolBinding {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SymbolBinding {}

impl fmt::Display for SymbolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolBinding::Attribute { module, name } => write!(f, "{}.{}", module.name(), name),
            SymbolBinding::Accessor(accessor) => f.write_str(accessor.name()),
        }
    }
}

impl fmt::Debug for SymbolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolBinding({})", self)
    }
}

/// Bindings found for one target, in discovery order. Each slot appears once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingSet {
    bindings: Vec<SymbolBinding>,
}

impl BindingSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binding unless its slot is already in the set. Returns
    /// whether it was added.
    pub fn push(&mut self, binding: SymbolBinding) -> bool {
        let key = binding.key();
        if self.bindings.iter().any(|b| b.key() == key) {
            return false;
        }
        self.bindings.push(binding);
        true
    }

    /// Iterate in discovery order
    pub fn iter(&self) -> std::slice::Iter<'_, SymbolBinding> {
        self.bindings.iter()
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing was found
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether the set contains the slot `module.name`
    pub fn contains(&self, module: &ModuleHandle, name: &str) -> bool {
        self.bindings.iter().any(|b| match b {
            SymbolBinding::Attribute { module: m, name: n } => Arc::ptr_eq(m, module) && n == name,
            SymbolBinding::Accessor(_) => false,
        })
    }

    /// Human-readable slot names, in order
    pub fn names(&self) -> Vec<String> {
        self.bindings.iter().map(ToString::to_string).collect()
    }
}

impl FromIterator<SymbolBinding> for BindingSet {
    fn from_iter<I: IntoIterator<Item = SymbolBinding>>(iter: I) -> Self {
        let mut set = Self::new();
        for binding in iter {
            set.push(binding);
        }
        set
    }
}

impl<'a> IntoIterator for &'a BindingSet {
    type Item = &'a SymbolBinding;
    type IntoIter = std::slice::Iter<'a, SymbolBinding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}
