//! # cellbind-rebind
//!
//! Transient, identity-based rebinding of named slots.
//!
//! A [`Module`] is a table of named slots with an optional backing file. The
//! [walker](walker::walk) enumerates every module reachable from a root that
//! lives under the root's directory; the [locator](locator::locate) finds each
//! slot currently holding a given [`Object`] (by identity, never by value);
//! an [`OverrideSession`] rebinds all of them to a replacement and puts the
//! original back on every exit path.
//!
//! ```rust
//! use cellbind_rebind::{locate_from, with_override, BindError, Module, Object};
//!
//! let root = Module::new("pkg", "/virtual/pkg/lib.rs");
//! let util = Module::new("pkg::util", "/virtual/pkg/util.rs");
//! let f = Object::new(|x: i32| x + 1);
//! let f2 = Object::new(|x: i32| x * 10);
//!
//! root.set_attr("util", util.clone()).unwrap();
//! util.set_attr("f", f.clone()).unwrap();
//!
//! let bindings = locate_from(&root, &f).unwrap();
//! assert_eq!(bindings.len(), 1);
//!
//! with_override(&f, &f2, &bindings, || {
//!     assert!(util.get_attr("f")?.is_object(&f2));
//!     Ok::<_, BindError>(())
//! })
//! .unwrap();
//! assert!(util.get_attr("f").unwrap().is_object(&f));
//! ```

pub mod binding;
pub mod cache;
pub mod error;
pub mod locator;
pub mod module;
pub mod object;
pub mod registry;
pub mod session;
pub mod walker;

pub use binding::{BindingSet, SlotKey, SymbolBinding};
pub use cache::BindingCache;
pub use error::{BindError, BindResult};
pub use locator::{locate, locate_from};
pub use module::{Module, ModuleHandle, Value};
pub use object::{Object, ObjectId};
pub use registry::{OverrideRegistry, SlotAccessor};
pub use session::{with_override, OverrideSession};
pub use walker::{walk, ModuleMap};
