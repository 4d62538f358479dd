//! XLSX error types

use thiserror::Error;

use crate::sink::OutputMode;

/// Result type for XLSX operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur during XLSX reading/writing
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Invalid file format
    #[error("Invalid XLSX format: {0}")]
    InvalidFormat(String),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] cellbind_core::Error),

    /// Slot discovery or override error
    #[error("Binding error: {0}")]
    Bind(#[from] cellbind_rebind::BindError),

    /// A value has no representation in the file
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A required hook or override target could not be found
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// The sink cannot take a rewritten cell element
    #[error("Output mode {mode:?} does not support cached value injection ({cell})")]
    UnsupportedOutputMode { mode: OutputMode, cell: String },
}

impl XlsxError {
    /// Whether this error means a target could not be found
    pub fn is_lookup_failure(&self) -> bool {
        match self {
            XlsxError::Lookup(_) => true,
            XlsxError::Bind(e) => e.is_lookup_failure(),
            _ => false,
        }
    }
}
