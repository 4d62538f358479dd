//! Prelude module - common imports for cellbind users
//!
//! ```rust
//! use cellbind::prelude::*;
//! ```

pub use crate::{
    // Cache types
    BindingCache,
    CachedValue,
    // Cell types
    CellAddress,
    CellError,
    CellValue,
    // Error types
    Error,
    Result,
    // Save pipeline
    SaveOptions,
    ValueCache,
    // Main types
    Workbook,
    // Extension traits
    WorkbookExt,
    Worksheet,
    XlsxError,
    // I/O types
    XlsxReader,
    XlsxWriter,
};
