//! Explicit override points
//!
//! Instead of discovering slots by walking a module graph, code that wants
//! one of its slots to be overridable registers it here under a point name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::binding::{BindingSet, SymbolBinding};
use crate::error::{BindError, BindResult};
use crate::module::ModuleHandle;
use crate::object::Object;

type SlotGetter = Box<dyn Fn() -> Result<Object, String> + Send + Sync>;
type SlotSetter = Box<dyn Fn(Object) -> Result<(), String> + Send + Sync>;

/// A slot reached through a getter/setter pair
pub struct SlotAccessor {
    name: String,
    get: SlotGetter,
    set: SlotSetter,
}

impl SlotAccessor {
    pub fn new<S, G, W>(name: S, get: G, set: W) -> Self
    where
        S: Into<String>,
        G: Fn() -> Result<Object, String> + Send + Sync + 'static,
        W: Fn(Object) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            get: Box::new(get),
            set: Box::new(set),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> BindResult<Object> {
        (self.get)().map_err(|message| BindError::AccessorRejected {
            slot: self.name.clone(),
            message,
        })
    }

    pub fn set(&self, value: Object) -> BindResult<()> {
        (self.set)(value).map_err(|message| BindError::AccessorRejected {
            slot: self.name.clone(),
            message,
        })
    }
}

impl fmt::Debug for SlotAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotAccessor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Named override points and the slots behind them
#[derive(Debug, Default)]
pub struct OverrideRegistry {
    points: BTreeMap<String, Vec<SymbolBinding>>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module.name` under `point`
    pub fn register_attribute(&mut self, point: &str, module: &ModuleHandle, name: &str) {
        self.register(point, SymbolBinding::attribute(module, name));
    }

    /// Register an accessor-backed slot under `point`
    pub fn register_accessor(&mut self, point: &str, accessor: SlotAccessor) {
        self.register(point, SymbolBinding::Accessor(Arc::new(accessor)));
    }

    /// Bindings registered for `point`, in registration order
    pub fn bindings(&self, point: &str) -> BindResult<BindingSet> {
        self.points
            .get(point)
            .map(|bindings| bindings.iter().cloned().collect())
            .ok_or_else(|| BindError::UnknownOverridePoint(point.to_string()))
    }

    /// Registered point names, sorted
    pub fn points(&self) -> impl Iterator<Item = &str> {
        self.points.keys().map(String::as_str)
    }

    fn register(&mut self, point: &str, binding: SymbolBinding) {
        let bindings = self.points.entry(point.to_string()).or_default();
        if !bindings.contains(&binding) {
            bindings.push(binding);
        }
    }
}
