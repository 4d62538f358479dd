//! Type-erased shared values compared by identity

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A shared, type-erased value that can sit in a slot.
///
/// Cloning an `Object` yields the *same* object. Two objects built from equal
/// values by separate calls to [`Object::new`] are different objects.
#[derive(Clone)]
pub struct Object {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Identity of an [`Object`] (its allocation address)
///
/// Only meaningful while the object is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl Object {
    /// Allocate a new object
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Identity of this object
    pub fn id(&self) -> ObjectId {
        ObjectId(Arc::as_ptr(&self.inner) as *const () as usize)
    }

    /// Identity comparison
    pub fn same(&self, other: &Object) -> bool {
        self.id() == other.id()
    }

    /// Borrow the value if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Name of the stored type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object<{}>@{:#x}", self.type_name, self.id().0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
