//! # cellbind
//!
//! Save spreadsheets with precomputed formula results.
//!
//! A formula cell in an XLSX file carries a cached result next to its formula
//! text. Readers that do not recalculate show that cached value. cellbind
//! takes results computed elsewhere, keyed by sheet and cell, and writes them
//! into those cached values while saving. It does so without changing the
//! writer: for one save, every slot holding the writer's per-cell hook is
//! rebound to an injecting wrapper, and put back afterwards.
//!
//! ## Example
//!
//! ```rust
//! use cellbind::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 21.0).unwrap();
//! sheet.set_cell_formula("B2", "=A1*2").unwrap();
//!
//! // Results computed by an external engine
//! let mut values = ValueCache::new();
//! values.insert("Sheet1", "B2", 42).unwrap();
//!
//! // Save to file
//! // cellbind::save_with_cache(&workbook, "output.xlsx", &values).unwrap();
//! ```

pub mod extract;
pub mod prelude;
pub mod save;

pub use extract::{cached_formula_values, collect_formula_values};
pub use save::{save_with_cache, save_with_cache_with_options, write_with_cache, SaveOptions};

// Re-export core types
pub use cellbind_core::{
    CalcMode,
    CellAddress,
    CellError,
    // Cell types
    CellValue,
    // Error types
    Error,
    Result,
    // Main types
    Workbook,
    WorkbookSettings,
    Worksheet,

    MAX_COLS,
    // Constants
    MAX_ROWS,
    MAX_SHEET_NAME_LEN,
};

// Re-export rebinding types
pub use cellbind_rebind::{BindError, BindingCache, OverrideRegistry};

// Re-export I/O types
pub use cellbind_xlsx::{
    CachedValue, CellValueInjector, OutputMode, ValueCache, ValueCacheKey, WriteOptions,
    XlsxError, XlsxReader, XlsxResult, XlsxWriter,
};

use std::path::Path;

/// Extension trait for Workbook to add file I/O
pub trait WorkbookExt {
    /// Open a workbook from a file
    fn open<P: AsRef<Path>>(path: P) -> Result<Workbook>;

    /// Save the workbook to a file
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>;

    /// Save the workbook to a file with `values` as the cached formula results
    fn save_with_values<P: AsRef<Path>>(&self, path: P, values: &ValueCache) -> Result<()>;
}

impl WorkbookExt for Workbook {
    fn open<P: AsRef<Path>>(path: P) -> Result<Workbook> {
        let path = path.as_ref();
        check_extension(path)?;
        XlsxReader::read_file(path).map_err(|e| Error::other(e.to_string()))
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        check_extension(path)?;
        XlsxWriter::write_file(self, path).map_err(|e| Error::other(e.to_string()))
    }

    fn save_with_values<P: AsRef<Path>>(&self, path: P, values: &ValueCache) -> Result<()> {
        let path = path.as_ref();
        check_extension(path)?;
        save_with_cache(self, path, values).map_err(|e| Error::other(e.to_string()))
    }
}

fn check_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => Ok(()),
        _ => Err(Error::other(format!(
            "Unsupported file format: {}",
            path.display()
        ))),
    }
}
