//! Error types for slot discovery and overriding

use thiserror::Error;

/// Result type for binding operations
pub type BindResult<T> = std::result::Result<T, BindError>;

/// Errors raised while discovering, overriding or restoring slots
#[derive(Debug, Error)]
pub enum BindError {
    /// The walk root has no backing file, so there is no directory to scope to
    #[error("module `{0}` is not loaded from a file")]
    NoBackingFile(String),

    /// Attribute does not exist on the module
    #[error("attribute `{module}.{name}` not found")]
    AttributeNotFound { module: String, name: String },

    /// Attribute getter failed
    #[error("reading `{module}.{name}` failed: {message}")]
    AttributeRaised {
        module: String,
        name: String,
        message: String,
    },

    /// Attribute is computed and cannot be assigned
    #[error("attribute `{module}.{name}` is read-only")]
    ReadOnly { module: String, name: String },

    /// Module no longer accepts writes
    #[error("module `{0}` is sealed")]
    Sealed(String),

    /// Accessor-backed slot rejected a write
    #[error("slot `{slot}` rejected the new value: {message}")]
    AccessorRejected { slot: String, message: String },

    /// Named override point was never registered
    #[error("override point `{0}` is not registered")]
    UnknownOverridePoint(String),

    /// Another live session already holds this slot
    #[error("slot `{0}` is already overridden by an active session")]
    OverlappingSession(String),

    /// Restoring one or more slots failed; every slot was still attempted
    #[error("failed to restore {failed} of {total} slot(s); first failure: {first}")]
    Restoration {
        failed: usize,
        total: usize,
        first: Box<BindError>,
    },
}

impl BindError {
    /// Whether this error means a target could not be found
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            BindError::NoBackingFile(_)
                | BindError::AttributeNotFound { .. }
                | BindError::UnknownOverridePoint(_)
        )
    }
}
